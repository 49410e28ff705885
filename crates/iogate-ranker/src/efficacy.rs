//! Efficacy score composition.
//!
//! E_adj = E_base × Π boost_i, applied in gate evaluation order. Scores are
//! expected in [0, 1] but the product is not clamped, so the trace always
//! shows the boost that was actually applied.
//! Confidence is raised per gate by its evidence tier and capped at 1.0.

use iogate_common::confidence::raise_confidence;
use serde::{Deserialize, Serialize};

use crate::gates::{Gate, GateEvaluation, GateId};

/// One audit line per applied gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleEntry {
    pub gate_id: GateId,
    pub boost: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_genes: Vec<String>,
    pub efficacy_before: f64,
    pub efficacy_after: f64,
    pub confidence_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficacyResult {
    pub base_efficacy: f64,
    pub base_confidence: f64,
    pub adjusted_efficacy: f64,
    pub adjusted_confidence: f64,
    /// Insertion order is evaluation order.
    pub applied_gates: Vec<Gate>,
    pub rationale: Vec<RationaleEntry>,
    /// Relevant conditions that did not produce a gate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl EfficacyResult {
    /// Overall multiplicative boost actually applied.
    pub fn total_boost(&self) -> f64 {
        if self.base_efficacy > 0.0 {
            self.adjusted_efficacy / self.base_efficacy
        } else {
            1.0
        }
    }

    pub fn has_gate(&self, id: GateId) -> bool {
        self.applied_gates.iter().any(|g| g.gate_id == id)
    }
}

/// Apply a full gate evaluation, carrying its notes into the result.
pub fn apply(base_efficacy: f64, base_confidence: f64, evaluation: &GateEvaluation) -> EfficacyResult {
    let mut result = apply_gates(base_efficacy, base_confidence, &evaluation.gates);
    result.notes = evaluation.notes.clone();
    result
}

/// Multiply `base_efficacy` by each gate's boost in the given order.
/// Gates are never re-sorted. Only confidence is clamped into [0, 1].
pub fn apply_gates(base_efficacy: f64, base_confidence: f64, gates: &[Gate]) -> EfficacyResult {
    let base_confidence = clamp_unit(base_confidence);

    let mut efficacy = base_efficacy;
    let mut confidence = base_confidence;
    let mut rationale = Vec::with_capacity(gates.len());

    for gate in gates {
        let before = efficacy;
        efficacy *= gate.boost_factor;
        confidence = raise_confidence(confidence, gate.evidence_tier);
        rationale.push(RationaleEntry {
            gate_id: gate.gate_id,
            boost: gate.boost_factor,
            reason: gate.reason.clone(),
            evidence_genes: gate.evidence_genes.clone(),
            efficacy_before: before,
            efficacy_after: efficacy,
            confidence_after: confidence,
        });
    }

    EfficacyResult {
        base_efficacy,
        base_confidence,
        adjusted_efficacy: efficacy,
        adjusted_confidence: confidence,
        applied_gates: gates.to_vec(),
        rationale,
        notes: Vec::new(),
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateCategory;
    use iogate_common::confidence::ConfidenceTier;

    fn gate(id: GateId, boost: f64, tier: ConfidenceTier) -> Gate {
        Gate {
            gate_id: id,
            category: GateCategory::TmbFamily,
            boost_factor: boost,
            reason: format!("{id} test"),
            evidence_tier: tier,
            evidence_genes: vec![],
        }
    }

    #[test]
    fn test_no_gates_is_identity() {
        let r = apply_gates(0.5, 0.7, &[]);
        assert_eq!(r.adjusted_efficacy, 0.5);
        assert_eq!(r.adjusted_confidence, 0.7);
        assert!(r.rationale.is_empty());
        assert_eq!(r.total_boost(), 1.0);
    }

    #[test]
    fn test_boosts_multiply_in_order() {
        let gates = [
            gate(GateId::IoTmbBoost, 1.35, ConfidenceTier::High),
            gate(GateId::IoMsiBoost, 1.30, ConfidenceTier::High),
        ];
        let r = apply_gates(0.4, 0.7, &gates);
        assert!((r.adjusted_efficacy - 0.4 * 1.35 * 1.30).abs() < 1e-9);
        assert_eq!(r.rationale[0].gate_id, GateId::IoTmbBoost);
        assert!((r.rationale[0].efficacy_after - 0.54).abs() < 1e-9);
        assert_eq!(r.rationale[1].efficacy_before, r.rationale[0].efficacy_after);
    }

    #[test]
    fn test_efficacy_product_not_clamped() {
        let r = apply_gates(0.9, 0.7, &[gate(GateId::IoTmbBoost, 1.35, ConfidenceTier::High)]);
        assert!((r.adjusted_efficacy - 1.215).abs() < 1e-9, "got {}", r.adjusted_efficacy);
        assert!((r.total_boost() - 1.35).abs() < 1e-9);

        let gates = [
            gate(GateId::IoTmbBoost, 1.35, ConfidenceTier::High),
            gate(GateId::IoMsiBoost, 1.30, ConfidenceTier::High),
            gate(GateId::IoPdl1Boost, 1.20, ConfidenceTier::High),
        ];
        let r = apply_gates(0.9, 0.7, &gates);
        assert!((r.adjusted_efficacy - 0.9 * 1.35 * 1.30 * 1.20).abs() < 1e-9);
        // Each trace step records the full multiplication.
        for entry in &r.rationale {
            assert!((entry.efficacy_after - entry.efficacy_before * entry.boost).abs() < 1e-12);
        }
        assert!(r.adjusted_confidence <= 1.0);
    }

    #[test]
    fn test_confidence_raised_by_tier_and_capped() {
        let gates = [
            gate(GateId::IoHypermutatorInference, 1.25, ConfidenceTier::Medium),
            gate(GateId::IoMsiBoost, 1.30, ConfidenceTier::High),
        ];
        let r = apply_gates(0.5, 0.7, &gates);
        assert!((r.adjusted_confidence - 0.85).abs() < 1e-9);

        let r = apply_gates(0.5, 0.98, &gates);
        assert_eq!(r.adjusted_confidence, 1.0);
    }

    #[test]
    fn test_base_efficacy_passed_through_confidence_clamped() {
        let r = apply_gates(1.4, -0.2, &[gate(GateId::IoMsiBoost, 1.30, ConfidenceTier::Low)]);
        assert_eq!(r.base_efficacy, 1.4);
        assert!((r.adjusted_efficacy - 1.82).abs() < 1e-9);
        assert_eq!(r.base_confidence, 0.0);
        assert_eq!(r.adjusted_confidence, 0.0);
    }
}
