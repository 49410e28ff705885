/// Evidence-strength tiers shared by eligibility verdicts and gate records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low    => "LOW",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::High   => "HIGH",
        }
    }

    /// Upward confidence adjustment granted by a gate backed by this tier.
    pub fn confidence_bump(&self) -> f64 {
        match self {
            ConfidenceTier::High   => 0.10,
            ConfidenceTier::Medium => 0.05,
            ConfidenceTier::Low    => 0.0,
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raise `current` by the tier's bump.
/// Never lowers the value and caps at 1.0.
pub fn raise_confidence(current: f64, tier: ConfidenceTier) -> f64 {
    let raised = (current + tier.confidence_bump()).min(1.0);
    current.max(raised)
}
