//! Biomarker gate evaluation.
//!
//! Gates are tagged rule variants evaluated in the fixed order of
//! [`GATE_PRIORITY`]. Within a [`GateCategory`] only the first rule that
//! fires is kept; a later rule of the same category that would also have
//! fired is recorded as a suppressed note instead. MSI and PD-L1 gates sit
//! in their own categories and so may co-occur with a TMB-family gate.

use std::collections::BTreeSet;

use iogate_common::biomarkers::{
    BiomarkerContext, EvidenceMutations, GermlineStatus, MutationRecord, PdL1Status, TmbAssessment,
};
use iogate_common::confidence::ConfidenceTier;
use iogate_common::reference::{
    ReferenceTables, HYPERMUTATOR_BOOST, MSI_BOOST, PD_L1_CPS_HIGH, PD_L1_CPS_POSITIVE,
    PD_L1_HIGH_BOOST, PD_L1_MEDIUM_BOOST, TMB_BOOST, TMB_HIGH_THRESHOLD,
};
use iogate_common::therapy::Therapy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateId {
    #[serde(rename = "IO_TMB_BOOST")]
    IoTmbBoost,
    #[serde(rename = "IO_HYPERMUTATOR_INFERENCE")]
    IoHypermutatorInference,
    #[serde(rename = "IO_MSI_BOOST")]
    IoMsiBoost,
    #[serde(rename = "IO_PDL1_BOOST")]
    IoPdl1Boost,
}

impl GateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateId::IoTmbBoost              => "IO_TMB_BOOST",
            GateId::IoHypermutatorInference => "IO_HYPERMUTATOR_INFERENCE",
            GateId::IoMsiBoost              => "IO_MSI_BOOST",
            GateId::IoPdl1Boost             => "IO_PDL1_BOOST",
        }
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutual-exclusion group of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    TmbFamily,
    Msi,
    PdL1,
}

/// One fired evaluation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub gate_id: GateId,
    pub category: GateCategory,
    pub boost_factor: f64,
    pub reason: String,
    pub evidence_tier: ConfidenceTier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_genes: Vec<String>,
}

/// Ordered gates plus notes for relevant conditions that did not fire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub gates: Vec<Gate>,
    pub notes: Vec<String>,
}

impl GateEvaluation {
    pub fn has_gate(&self, id: GateId) -> bool {
        self.gate(id).is_some()
    }

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.iter().find(|g| g.gate_id == id)
    }
}

// ── Rules ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRule {
    MeasuredTmb,
    HypermutatorInference,
    MsiHigh,
    PdL1Expression,
}

/// Evaluation order. Measured TMB outranks inferred TMB.
pub const GATE_PRIORITY: [GateRule; 4] = [
    GateRule::MeasuredTmb,
    GateRule::HypermutatorInference,
    GateRule::MsiHigh,
    GateRule::PdL1Expression,
];

enum RuleOutcome {
    Fired(Gate),
    Skipped(String),
    NotApplicable,
}

/// Everything a rule may read, assembled once per evaluation.
struct GateInput<'a> {
    context: &'a BiomarkerContext,
    germline_status: GermlineStatus,
    evidence: EvidenceMutations,
    tmb: TmbAssessment,
    hypermutator_genes: &'a BTreeSet<String>,
}

impl GateRule {
    pub fn gate_id(&self) -> GateId {
        match self {
            GateRule::MeasuredTmb           => GateId::IoTmbBoost,
            GateRule::HypermutatorInference => GateId::IoHypermutatorInference,
            GateRule::MsiHigh               => GateId::IoMsiBoost,
            GateRule::PdL1Expression        => GateId::IoPdl1Boost,
        }
    }

    pub fn category(&self) -> GateCategory {
        match self {
            GateRule::MeasuredTmb | GateRule::HypermutatorInference => GateCategory::TmbFamily,
            GateRule::MsiHigh        => GateCategory::Msi,
            GateRule::PdL1Expression => GateCategory::PdL1,
        }
    }

    fn gate(&self, boost_factor: f64, evidence_tier: ConfidenceTier, reason: String) -> Gate {
        Gate {
            gate_id: self.gate_id(),
            category: self.category(),
            boost_factor,
            reason,
            evidence_tier,
            evidence_genes: Vec::new(),
        }
    }

    fn evaluate(&self, input: &GateInput<'_>) -> RuleOutcome {
        match self {
            GateRule::MeasuredTmb => match input.tmb.measured {
                Some(tmb) if tmb >= TMB_HIGH_THRESHOLD => RuleOutcome::Fired(self.gate(
                    TMB_BOOST,
                    ConfidenceTier::High,
                    format!(
                        "Measured TMB {tmb:.1} mut/Mb >= {TMB_HIGH_THRESHOLD:.0} (TMB-H): \
                         checkpoint inhibitor boost {TMB_BOOST}x"
                    ),
                )),
                Some(tmb) => RuleOutcome::Skipped(format!(
                    "Measured TMB {tmb:.1} mut/Mb below {TMB_HIGH_THRESHOLD:.0}; no measured TMB boost"
                )),
                None => RuleOutcome::Skipped(
                    "TMB not measured; hypermutator inference attempted".to_string(),
                ),
            },

            GateRule::HypermutatorInference => {
                let genes = &input.tmb.inferred_genes;
                if genes.is_empty() {
                    return RuleOutcome::NotApplicable;
                }
                let measured = match input.tmb.measured {
                    Some(tmb) => format!("measured TMB {tmb:.1} mut/Mb below threshold"),
                    None => "TMB not measured".to_string(),
                };
                let sourced: Vec<String> = genes
                    .iter()
                    .map(|gene| {
                        let origins: Vec<&str> = input
                            .evidence
                            .pathogenic_origins(gene)
                            .iter()
                            .map(|o| o.as_str())
                            .collect();
                        format!("{gene} ({})", origins.join(" + "))
                    })
                    .collect();
                let mut gate = self.gate(
                    HYPERMUTATOR_BOOST,
                    ConfidenceTier::Medium,
                    format!(
                        "Pathogenic hypermutator lesion in {} (germline status {}) with {measured}: \
                         TMB-H inferred, boost {HYPERMUTATOR_BOOST}x",
                        sourced.join(", "),
                        input.germline_status,
                    ),
                );
                gate.evidence_genes = genes.clone();
                RuleOutcome::Fired(gate)
            }

            GateRule::MsiHigh => {
                let ctx = input.context;
                if ctx.msi_high_by_ihc() {
                    RuleOutcome::Fired(self.gate(
                        MSI_BOOST,
                        ConfidenceTier::High,
                        format!("MMR {} on IHC (MSI-H/dMMR): boost {MSI_BOOST}x", ctx.mmr_status),
                    ))
                } else if ctx.msi_high() {
                    RuleOutcome::Fired(self.gate(
                        MSI_BOOST,
                        ConfidenceTier::Medium,
                        format!("Inferred MSI status {}: boost {MSI_BOOST}x", ctx.msi_status_inferred),
                    ))
                } else {
                    RuleOutcome::NotApplicable
                }
            }

            GateRule::PdL1Expression => {
                let ctx = input.context;
                if ctx.pd_l1_status != PdL1Status::Positive {
                    return RuleOutcome::NotApplicable;
                }
                match ctx.cps() {
                    Some(cps) if cps >= PD_L1_CPS_HIGH => RuleOutcome::Fired(self.gate(
                        PD_L1_HIGH_BOOST,
                        ConfidenceTier::High,
                        format!(
                            "PD-L1 positive, CPS {cps} >= {PD_L1_CPS_HIGH:.0} (high expression): \
                             boost {PD_L1_HIGH_BOOST}x"
                        ),
                    )),
                    Some(cps) if cps >= PD_L1_CPS_POSITIVE => RuleOutcome::Fired(self.gate(
                        PD_L1_MEDIUM_BOOST,
                        ConfidenceTier::Medium,
                        format!("PD-L1 positive, CPS {cps} (1-9): boost {PD_L1_MEDIUM_BOOST}x"),
                    )),
                    Some(cps) => RuleOutcome::Skipped(format!(
                        "PD-L1 reported positive but CPS {cps} below {PD_L1_CPS_POSITIVE:.0}; no PD-L1 boost"
                    )),
                    None => RuleOutcome::Skipped(
                        "PD-L1 reported positive without a usable CPS; no PD-L1 boost".to_string(),
                    ),
                }
            }
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluates biomarker gates against the loaded reference tables.
pub struct GateEvaluator<'a> {
    tables: &'a ReferenceTables,
}

impl<'a> GateEvaluator<'a> {
    pub fn new(tables: &'a ReferenceTables) -> Self {
        Self { tables }
    }

    /// Evaluate every rule for one drug against one context.
    ///
    /// Non-IO therapies receive an empty gate list. Mutations are read from
    /// the context's nested germline record, its flat list and
    /// `germline_mutations`, merged once into a single evidence list.
    pub fn evaluate(
        &self,
        therapy: &Therapy,
        germline_status: GermlineStatus,
        context: &BiomarkerContext,
        germline_mutations: Option<&[MutationRecord]>,
    ) -> GateEvaluation {
        let mut evaluation = GateEvaluation::default();

        if !therapy.is_immunotherapy() {
            tracing::debug!(
                drug_class = therapy.drug_class.as_str(),
                moa = therapy.moa.as_str(),
                "Biomarker gates skipped for non-IO therapy"
            );
            return evaluation;
        }

        let evidence = EvidenceMutations::assemble(context, germline_mutations);
        let tmb = TmbAssessment::assess(context, &evidence, &self.tables.hypermutator_genes);
        let input = GateInput {
            context,
            germline_status,
            evidence,
            tmb,
            hypermutator_genes: &self.tables.hypermutator_genes,
        };

        for rule in GATE_PRIORITY {
            match rule.evaluate(&input) {
                RuleOutcome::Fired(gate) => {
                    if let Some(earlier) = evaluation.gates.iter().find(|g| g.category == gate.category) {
                        evaluation.notes.push(format!(
                            "{} suppressed: {} already applied",
                            gate.gate_id, earlier.gate_id
                        ));
                        continue;
                    }
                    tracing::debug!(
                        gate = gate.gate_id.as_str(),
                        boost = gate.boost_factor,
                        genes = ?gate.evidence_genes,
                        "Gate fired"
                    );
                    evaluation.gates.push(gate);
                }
                RuleOutcome::Skipped(note) => evaluation.notes.push(note),
                RuleOutcome::NotApplicable => {}
            }
        }

        evaluation.notes.extend(hypermutator_audit_notes(&input));
        evaluation
    }
}

/// Hypermutator-gene records that could not trigger inference.
fn hypermutator_audit_notes(input: &GateInput<'_>) -> Vec<String> {
    let mut notes = Vec::new();
    for m in input.evidence.unrecognized_in(input.hypermutator_genes) {
        tracing::warn!(
            gene = %m.gene,
            classification = m.classification.as_str(),
            "Unrecognised classification treated as non-triggering"
        );
        notes.push(format!(
            "{} classification '{}' not recognised; treated as non-triggering",
            m.gene,
            m.classification.as_str()
        ));
    }
    for m in input.evidence.iter() {
        if input.hypermutator_genes.contains(&m.gene)
            && m.classification.is_recognized()
            && !m.classification.is_pathogenic()
            && !input.tmb.inferred_genes.contains(&m.gene)
        {
            notes.push(format!(
                "{} {} does not support hypermutator inference",
                m.gene,
                m.classification.as_str()
            ));
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use iogate_common::biomarkers::{Classification, GermlineRecord, MmrStatus, MsiStatus};

    fn pembrolizumab() -> Therapy {
        Therapy::new("checkpoint_inhibitor", "anti-pd1")
    }

    fn with_mutations(measured_tmb: Option<f64>, genes: &[(&str, Classification)]) -> BiomarkerContext {
        BiomarkerContext {
            msi_status_inferred: MsiStatus::Mss,
            measured_tmb,
            mutations: genes
                .iter()
                .map(|(g, c)| MutationRecord::new(g, c.clone()))
                .collect(),
            ..Default::default()
        }
    }

    fn evaluate(ctx: &BiomarkerContext) -> GateEvaluation {
        let tables = ReferenceTables::default();
        GateEvaluator::new(&tables).evaluate(&pembrolizumab(), GermlineStatus::Unknown, ctx, None)
    }

    #[test]
    fn test_priority_order_is_fixed() {
        let ids: Vec<GateId> = GATE_PRIORITY.iter().map(|r| r.gate_id()).collect();
        assert_eq!(
            ids,
            vec![GateId::IoTmbBoost, GateId::IoHypermutatorInference, GateId::IoMsiBoost, GateId::IoPdl1Boost]
        );
    }

    #[test]
    fn test_measured_tmb_suppresses_hypermutator() {
        let ctx = with_mutations(Some(10.0), &[("MBD4", Classification::Pathogenic)]);
        let eval = evaluate(&ctx);
        assert!(eval.has_gate(GateId::IoTmbBoost));
        assert!(!eval.has_gate(GateId::IoHypermutatorInference));
        assert_eq!(eval.gate(GateId::IoTmbBoost).unwrap().boost_factor, 1.35);
        assert!(eval.notes.iter().any(|n| n.contains("IO_HYPERMUTATOR_INFERENCE suppressed")));
    }

    #[test]
    fn test_low_measured_tmb_falls_back_to_inference() {
        let ctx = with_mutations(Some(9.9), &[("POLD1", Classification::Pathogenic)]);
        let eval = evaluate(&ctx);
        assert!(!eval.has_gate(GateId::IoTmbBoost));
        let gate = eval.gate(GateId::IoHypermutatorInference).unwrap();
        assert_eq!(gate.boost_factor, 1.25);
        assert_eq!(gate.evidence_genes, vec!["POLD1"]);
        assert!(gate.reason.contains("below threshold"));
    }

    #[test]
    fn test_every_matching_gene_listed() {
        let ctx = with_mutations(
            None,
            &[
                ("POLE", Classification::Pathogenic),
                ("TP53", Classification::Pathogenic),
                ("MBD4", Classification::Pathogenic),
            ],
        );
        let eval = evaluate(&ctx);
        let gate = eval.gate(GateId::IoHypermutatorInference).unwrap();
        assert_eq!(gate.evidence_genes, vec!["POLE", "MBD4"]);
        assert!(gate.reason.contains("POLE (tumour panel), MBD4 (tumour panel)"));
    }

    #[test]
    fn test_nested_germline_and_parameter_are_read() {
        let ctx = BiomarkerContext {
            germline: Some(GermlineRecord {
                status: GermlineStatus::Positive,
                mutations: vec![MutationRecord::new("MBD4", Classification::Pathogenic)],
            }),
            ..Default::default()
        };
        let nested = evaluate(&ctx);
        let gate = nested.gate(GateId::IoHypermutatorInference).unwrap();
        assert!(gate.reason.contains("MBD4 (germline record)"), "{}", gate.reason);

        let tables = ReferenceTables::default();
        let supplied = vec![MutationRecord::new("POLE", Classification::Pathogenic)];
        let eval = GateEvaluator::new(&tables).evaluate(
            &pembrolizumab(),
            GermlineStatus::Positive,
            &BiomarkerContext::default(),
            Some(&supplied),
        );
        let gate = eval.gate(GateId::IoHypermutatorInference).unwrap();
        assert_eq!(gate.evidence_genes, vec!["POLE"]);
        assert!(gate.reason.contains("POLE (supplied germline panel)"));
    }

    #[test]
    fn test_vus_and_malformed_do_not_trigger() {
        let ctx = with_mutations(
            None,
            &[
                ("MBD4", Classification::Vus),
                ("POLE", Classification::parse("pathogenicish")),
            ],
        );
        let eval = evaluate(&ctx);
        assert!(eval.gates.is_empty());
        assert!(eval.notes.iter().any(|n| n.contains("'pathogenicish' not recognised")));
        assert!(eval.notes.iter().any(|n| n.contains("MBD4 VUS")));
    }

    #[test]
    fn test_msi_and_tmb_co_occur() {
        let ctx = BiomarkerContext {
            mmr_status: MmrStatus::Lost,
            measured_tmb: Some(30.0),
            ..Default::default()
        };
        let eval = evaluate(&ctx);
        let ids: Vec<GateId> = eval.gates.iter().map(|g| g.gate_id).collect();
        assert_eq!(ids, vec![GateId::IoTmbBoost, GateId::IoMsiBoost]);
        assert_eq!(eval.gate(GateId::IoMsiBoost).unwrap().evidence_tier, ConfidenceTier::High);
    }

    #[test]
    fn test_inferred_msi_is_medium_tier() {
        let ctx = BiomarkerContext {
            msi_status_inferred: MsiStatus::MsiHigh,
            ..Default::default()
        };
        let gate = evaluate(&ctx).gate(GateId::IoMsiBoost).cloned().unwrap();
        assert_eq!(gate.evidence_tier, ConfidenceTier::Medium);
    }

    #[test]
    fn test_pdl1_tiers() {
        let high = BiomarkerContext {
            pd_l1_status: PdL1Status::Positive,
            pd_l1_cps: Some(10.0),
            ..Default::default()
        };
        assert_eq!(evaluate(&high).gate(GateId::IoPdl1Boost).unwrap().boost_factor, PD_L1_HIGH_BOOST);

        let medium = BiomarkerContext { pd_l1_cps: Some(3.0), ..high.clone() };
        assert_eq!(evaluate(&medium).gate(GateId::IoPdl1Boost).unwrap().boost_factor, PD_L1_MEDIUM_BOOST);

        let below = BiomarkerContext { pd_l1_cps: Some(0.5), ..high.clone() };
        let eval = evaluate(&below);
        assert!(!eval.has_gate(GateId::IoPdl1Boost));
        assert!(eval.notes.iter().any(|n| n.contains("below 1")));

        let negative = BiomarkerContext { pd_l1_status: PdL1Status::Negative, ..high };
        assert!(!evaluate(&negative).has_gate(GateId::IoPdl1Boost));
    }

    #[test]
    fn test_non_io_drug_gets_no_gates() {
        let tables = ReferenceTables::default();
        let ctx = with_mutations(Some(40.0), &[("MBD4", Classification::Pathogenic)]);
        let eval = GateEvaluator::new(&tables).evaluate(
            &Therapy::new("parp_inhibitor", "parp1/2"),
            GermlineStatus::Positive,
            &ctx,
            None,
        );
        assert!(eval.gates.is_empty());
    }

    #[test]
    fn test_gate_ids_serialise_to_wire_names() {
        let json = serde_json::to_string(&GateId::IoHypermutatorInference).unwrap();
        assert_eq!(json, "\"IO_HYPERMUTATOR_INFERENCE\"");
    }
}
