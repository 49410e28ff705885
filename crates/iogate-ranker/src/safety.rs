//! irAE-based drug safety selection.
//!
//! adjusted_risk = min(1, irae_grade3plus_rate × multiplier), where the
//! multiplier is 1.0, doubled for any autoimmune history. Age is recorded
//! as a risk factor only and never changes the multiplier.
//!
//! Drugs are sorted ascending by adjusted risk. The selected drug is the
//! first PD-1/PD-L1 monotherapy in that order; CTLA-4 monotherapy and
//! CTLA-4 combinations are only selected when no monotherapy is eligible,
//! and are always surfaced in the avoid list.

use iogate_common::error::{IoGateError, Result};
use iogate_common::reference::{
    normalise_drug_id, DrugTarget, ReferenceTables, AUTOIMMUNE_RISK_MULTIPLIER,
};
use serde::{Deserialize, Serialize};

/// Patients below this age are noted as lower baseline irAE risk.
const OLDER_PATIENT_AGE: u32 = 65;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRiskEntry {
    pub drug: String,
    pub brand_name: String,
    pub target: DrugTarget,
    pub irae_grade3plus_rate: f64,
    pub adjusted_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvoidEntry {
    pub drug: String,
    pub target: DrugTarget,
    pub irae_grade3plus_rate: f64,
}

/// A requested drug id with no safety profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownDrug {
    pub drug: String,
    pub reason: String,
}

/// Every known drug ranked by adjusted risk, plus the ids that had no profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyComparison {
    pub ranked: Vec<DrugRiskEntry>,
    pub unknown_drugs: Vec<UnknownDrug>,
    pub risk_multiplier: f64,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySelection {
    pub selected_drug: String,
    pub brand_name: String,
    pub target: DrugTarget,
    pub raw_risk: f64,
    pub adjusted_risk: f64,
    pub reason: String,
    pub monitoring_priority: Vec<String>,
    pub avoid_list: Vec<AvoidEntry>,
    pub risk_factors: Vec<String>,
    pub ranked: Vec<DrugRiskEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_drugs: Vec<UnknownDrug>,
}

/// Patient-level irAE risk modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskModifiers {
    pub age: Option<u32>,
    #[serde(default)]
    pub autoimmune_history: Vec<String>,
}

impl RiskModifiers {
    pub fn new(age: u32, autoimmune_history: Option<&[String]>) -> Self {
        Self {
            age: Some(age),
            autoimmune_history: autoimmune_history.map(<[String]>::to_vec).unwrap_or_default(),
        }
    }

    /// Multiplier plus a human-readable line per modifier considered.
    pub fn risk_multiplier(&self) -> (f64, Vec<String>) {
        let mut multiplier = 1.0;
        let mut factors = Vec::new();

        let conditions: Vec<&str> = self
            .autoimmune_history
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if !conditions.is_empty() {
            multiplier *= AUTOIMMUNE_RISK_MULTIPLIER;
            factors.push(format!(
                "Autoimmune history ({}): irAE risk x{AUTOIMMUNE_RISK_MULTIPLIER}",
                conditions.join(", ")
            ));
        }

        if let Some(age) = self.age {
            if age < OLDER_PATIENT_AGE {
                factors.push(format!(
                    "Age {age}: younger patient, lower baseline irAE risk (informational, not applied)"
                ));
            } else {
                factors.push(format!("Age {age}: recorded (informational, not applied)"));
            }
        }

        (multiplier, factors)
    }
}

/// Rank every known drug in `drug_ids` by adjusted irAE risk, safest first.
///
/// Unknown ids are reported, never fabricated; duplicates (after id
/// normalisation) are evaluated once.
pub fn compare_by_safety(
    tables: &ReferenceTables,
    drug_ids: &[String],
    modifiers: &RiskModifiers,
) -> SafetyComparison {
    let (multiplier, risk_factors) = modifiers.risk_multiplier();
    let mut ranked: Vec<DrugRiskEntry> = Vec::new();
    let mut unknown_drugs: Vec<UnknownDrug> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for raw in drug_ids {
        let id = normalise_drug_id(raw);
        if seen.contains(&id) {
            continue;
        }
        seen.push(id.clone());

        match tables.profile(&id) {
            Some(profile) => ranked.push(DrugRiskEntry {
                drug: id,
                brand_name: profile.brand_name.clone(),
                target: profile.target,
                irae_grade3plus_rate: profile.irae_grade3plus_rate,
                adjusted_risk: (profile.irae_grade3plus_rate * multiplier).min(1.0),
            }),
            None => {
                tracing::warn!(drug = %raw, "No safety profile for requested drug");
                unknown_drugs.push(UnknownDrug {
                    drug: raw.clone(),
                    reason: "profile not found".to_string(),
                });
            }
        }
    }

    ranked.sort_by(|a, b| {
        a.adjusted_risk
            .total_cmp(&b.adjusted_risk)
            .then_with(|| a.drug.cmp(&b.drug))
    });

    SafetyComparison {
        ranked,
        unknown_drugs,
        risk_multiplier: multiplier,
        risk_factors,
    }
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

/// Choose the safest eligible IO drug for this patient.
///
/// Fails only when none of `eligible_drug_ids` has a safety profile.
pub fn select_safest(
    tables: &ReferenceTables,
    eligible_drug_ids: &[String],
    patient_age: u32,
    autoimmune_history: Option<&[String]>,
) -> Result<SafetySelection> {
    let modifiers = RiskModifiers::new(patient_age, autoimmune_history);
    let comparison = compare_by_safety(tables, eligible_drug_ids, &modifiers);

    let lowest = comparison
        .ranked
        .first()
        .ok_or_else(|| IoGateError::NoEligibleDrugs(eligible_drug_ids.to_vec()))?;

    let (selected, reason) = match comparison
        .ranked
        .iter()
        .find(|d| d.target.is_pd_axis_monotherapy())
    {
        Some(mono) if mono.drug == lowest.drug => (
            mono,
            format!(
                "Lowest irAE risk among eligible drugs: {} monotherapy, {} grade 3+",
                mono.target,
                percent(mono.irae_grade3plus_rate)
            ),
        ),
        Some(mono) => (
            mono,
            format!(
                "Lowest-risk {} monotherapy ({} grade 3+); CTLA-4-containing options deprioritised \
                 despite lower adjusted risk",
                mono.target,
                percent(mono.irae_grade3plus_rate)
            ),
        ),
        None => (
            lowest,
            format!(
                "No PD-1/PD-L1 monotherapy eligible; lowest-risk remaining option ({}, {} grade 3+) \
                 requires close monitoring",
                lowest.target,
                percent(lowest.irae_grade3plus_rate)
            ),
        ),
    };

    let avoid_list = comparison
        .ranked
        .iter()
        .filter(|d| d.target.is_high_risk_tier() && d.drug != selected.drug)
        .map(|d| AvoidEntry {
            drug: d.drug.clone(),
            target: d.target,
            irae_grade3plus_rate: d.irae_grade3plus_rate,
        })
        .collect::<Vec<_>>();

    tracing::info!(
        selected = %selected.drug,
        adjusted_risk = selected.adjusted_risk,
        avoid = avoid_list.len(),
        unknown = comparison.unknown_drugs.len(),
        "Safest IO drug selected"
    );

    Ok(SafetySelection {
        selected_drug: selected.drug.clone(),
        brand_name: selected.brand_name.clone(),
        target: selected.target,
        raw_risk: selected.irae_grade3plus_rate,
        adjusted_risk: selected.adjusted_risk,
        reason,
        monitoring_priority: selected
            .target
            .monitoring_priority()
            .iter()
            .map(|s| s.to_string())
            .collect(),
        avoid_list,
        risk_factors: comparison.risk_factors.clone(),
        ranked: comparison.ranked.clone(),
        unknown_drugs: comparison.unknown_drugs.clone(),
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
