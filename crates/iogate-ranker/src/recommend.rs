//! Efficacy ranking of candidate IO drugs and the end-to-end patient
//! assessment wiring both decision engines together.

use iogate_common::biomarkers::{BiomarkerContext, EvidenceMutations, MutationRecord, TmbAssessment};
use iogate_common::confidence::ConfidenceTier;
use iogate_common::error::{IoGateError, Result};
use iogate_common::reference::ReferenceTables;
use iogate_common::therapy::Therapy;
use serde::{Deserialize, Serialize};

use crate::efficacy::{self, EfficacyResult};
use crate::eligibility::{determine_for_context, EligibilityVerdict};
use crate::gates::GateEvaluator;
use crate::safety::{select_safest, SafetySelection};

/// IO + PARP combination offered alongside monotherapy when a DNA-repair
/// lesion is present.
pub const IO_PARP_COMBINATION: &str = "pembrolizumab + olaparib";

/// Everything the engines need to know about one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: String,
    pub age: u32,
    #[serde(default)]
    pub autoimmune_history: Vec<String>,
    pub context: BiomarkerContext,
    /// Germline panel supplied outside the tumour context.
    #[serde(default)]
    pub germline_mutations: Vec<MutationRecord>,
}

impl PatientProfile {
    pub fn validate(&self) -> Result<()> {
        if self.patient_id.trim().is_empty() {
            return Err(IoGateError::InvalidInput("patient_id must not be empty".into()));
        }
        Ok(())
    }

    fn extra_germline(&self) -> Option<&[MutationRecord]> {
        if self.germline_mutations.is_empty() {
            None
        } else {
            Some(&self.germline_mutations)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub drug_id: String,
    pub therapy: Therapy,
    pub efficacy: EfficacyResult,
}

/// Clinician-facing digest of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub io_eligible: bool,
    pub confidence: ConfidenceTier,
    pub top_recommendation: Option<String>,
    pub combination_option: Option<String>,
    /// Pathogenic DNA-repair genes behind the combination option.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ddr_genes: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoAssessment {
    pub patient_id: String,
    pub verdict: EligibilityVerdict,
    pub efficacy_ranking: Vec<RankedCandidate>,
    /// Present only when the verdict is eligible and a profiled IO drug exists.
    pub safety: Option<SafetySelection>,
    pub summary: AssessmentSummary,
    /// Why a step was skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Score every candidate in the catalogue, best adjusted efficacy first.
pub fn rank_by_efficacy(
    context: &BiomarkerContext,
    germline_mutations: Option<&[MutationRecord]>,
    tables: &ReferenceTables,
) -> Vec<RankedCandidate> {
    let evaluator = GateEvaluator::new(tables);
    let germline_status = context.effective_germline_status();

    let mut ranked: Vec<RankedCandidate> = tables
        .candidates
        .iter()
        .map(|candidate| {
            let gates = evaluator.evaluate(&candidate.therapy, germline_status, context, germline_mutations);
            RankedCandidate {
                drug_id: candidate.drug_id.clone(),
                therapy: candidate.therapy.clone(),
                efficacy: efficacy::apply(candidate.base_efficacy, candidate.base_confidence, &gates),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.efficacy
            .adjusted_efficacy
            .total_cmp(&a.efficacy.adjusted_efficacy)
            .then_with(|| a.drug_id.cmp(&b.drug_id))
    });
    ranked
}

/// Top recommendation, IO + PARP option and follow-up actions.
pub fn summarise(
    verdict: &EligibilityVerdict,
    tmb: &TmbAssessment,
    ranking: &[RankedCandidate],
    safety: Option<&SafetySelection>,
    ddr_genes: Vec<String>,
) -> AssessmentSummary {
    let top_recommendation = if verdict.eligible {
        safety.map(|s| s.selected_drug.clone()).or_else(|| {
            ranking
                .iter()
                .find(|c| c.therapy.is_immunotherapy())
                .map(|c| c.drug_id.clone())
        })
    } else {
        None
    };
    let combination_option = (verdict.eligible && !ddr_genes.is_empty())
        .then(|| IO_PARP_COMBINATION.to_string());

    let mut next_steps = Vec::new();
    if tmb.inferred_high() {
        next_steps.push("Confirm TMB with NGS panel".to_string());
    } else if tmb.measured.is_none() {
        next_steps.push("Measure TMB with NGS panel".to_string());
    }
    let msi = &verdict.assessments.msi;
    if msi.eligible && msi.confidence != ConfidenceTier::High {
        next_steps.push("Confirm MSI status with MMR IHC or MSI PCR".to_string());
    }
    if combination_option.is_some() {
        next_steps.push(format!(
            "Consider IO + PARP combination given DDR deficiency ({})",
            ddr_genes.join("/")
        ));
    }
    if verdict.eligible {
        next_steps.push("Discuss clinical trial options".to_string());
    } else {
        next_steps.push("IO not indicated on current biomarkers; reassess when new results arrive".to_string());
    }

    AssessmentSummary {
        io_eligible: verdict.eligible,
        confidence: verdict.confidence_tier,
        top_recommendation,
        combination_option,
        ddr_genes,
        next_steps,
    }
}

/// Safety selection over the IO drugs of the ranking. A catalogue without a
/// profiled IO drug skips selection with a note instead of failing.
fn safest_candidate(
    profile: &PatientProfile,
    tables: &ReferenceTables,
    ranking: &[RankedCandidate],
    notes: &mut Vec<String>,
) -> Result<Option<SafetySelection>> {
    let eligible_ids: Vec<String> = ranking
        .iter()
        .filter(|c| c.therapy.is_immunotherapy())
        .map(|c| c.drug_id.clone())
        .collect();
    if eligible_ids.is_empty() {
        tracing::warn!(patient = %profile.patient_id, "No IO drug in the candidate catalogue");
        notes.push("Safety selection skipped: candidate catalogue has no IO drug".to_string());
        return Ok(None);
    }

    let history = (!profile.autoimmune_history.is_empty())
        .then_some(profile.autoimmune_history.as_slice());
    match select_safest(tables, &eligible_ids, profile.age, history) {
        Ok(selection) => Ok(Some(selection)),
        Err(IoGateError::NoEligibleDrugs(ids)) => {
            tracing::warn!(patient = %profile.patient_id, drugs = ?ids, "No IO candidate has a safety profile");
            notes.push(format!(
                "Safety selection skipped: no safety profile for {}",
                ids.join(", ")
            ));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Eligibility verdict, efficacy ranking, the safety-adjusted drug choice
/// for eligible patients and a summary of all three.
pub fn assess_patient(profile: &PatientProfile, tables: &ReferenceTables) -> Result<IoAssessment> {
    profile.validate()?;

    let extra = profile.extra_germline();
    let evidence = EvidenceMutations::assemble(&profile.context, extra);
    let tmb = TmbAssessment::assess(&profile.context, &evidence, &tables.hypermutator_genes);
    let verdict = determine_for_context(&profile.context, extra, tables);
    let efficacy_ranking = rank_by_efficacy(&profile.context, extra, tables);

    let mut notes = Vec::new();
    let safety = if verdict.eligible {
        safest_candidate(profile, tables, &efficacy_ranking, &mut notes)?
    } else {
        None
    };

    let ddr_genes = evidence.pathogenic_in(&tables.ddr_deficiency_genes());
    let summary = summarise(&verdict, &tmb, &efficacy_ranking, safety.as_ref(), ddr_genes);

    tracing::info!(
        patient = %profile.patient_id,
        eligible = verdict.eligible,
        tier = verdict.confidence_tier.as_str(),
        top = summary.top_recommendation.as_deref().unwrap_or("-"),
        combination = summary.combination_option.is_some(),
        "Patient assessed"
    );

    Ok(IoAssessment {
        patient_id: profile.patient_id.clone(),
        verdict,
        efficacy_ranking,
        safety,
        summary,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateId;
    use iogate_common::biomarkers::{Classification, MmrStatus, MsiStatus, PdL1Status};
    use iogate_common::reference::CandidateDrug;

    fn profile(context: BiomarkerContext) -> PatientProfile {
        PatientProfile {
            patient_id: "P-001".into(),
            age: 58,
            autoimmune_history: vec![],
            context,
            germline_mutations: vec![],
        }
    }

    #[test]
    fn test_ranking_sorted_descending() {
        let ctx = BiomarkerContext {
            measured_tmb: Some(14.0),
            ..Default::default()
        };
        let ranked = rank_by_efficacy(&ctx, None, &ReferenceTables::default());
        assert_eq!(ranked.len(), ReferenceTables::default().candidates.len());
        for pair in ranked.windows(2) {
            assert!(pair[0].efficacy.adjusted_efficacy >= pair[1].efficacy.adjusted_efficacy);
        }
        assert!(ranked.iter().all(|c| c.efficacy.has_gate(GateId::IoTmbBoost)));
    }

    #[test]
    fn test_ineligible_patient_gets_no_safety_selection() {
        let ctx = BiomarkerContext {
            pd_l1_status: PdL1Status::Negative,
            mmr_status: MmrStatus::Preserved,
            msi_status_inferred: MsiStatus::Mss,
            measured_tmb: Some(2.0),
            ..Default::default()
        };
        let assessment = assess_patient(&profile(ctx), &ReferenceTables::default()).unwrap();
        assert!(!assessment.verdict.eligible);
        assert!(assessment.safety.is_none());
        assert!(!assessment.efficacy_ranking.is_empty());
    }

    #[test]
    fn test_eligible_patient_gets_safe_pd_axis_drug() {
        let mut p = profile(BiomarkerContext {
            msi_status_inferred: MsiStatus::Mss,
            ..Default::default()
        });
        p.germline_mutations = vec![MutationRecord::new("MBD4", Classification::Pathogenic)];
        let assessment = assess_patient(&p, &ReferenceTables::default()).unwrap();
        assert!(assessment.verdict.eligible);
        let safety = assessment.safety.unwrap();
        assert!(safety.target.is_pd_axis_monotherapy());
        assert!(safety.avoid_list.iter().any(|a| a.drug == "ipilimumab"));
    }

    #[test]
    fn test_summary_inferred_tmb_offers_combination() {
        let mut p = profile(BiomarkerContext {
            mmr_status: MmrStatus::Preserved,
            msi_status_inferred: MsiStatus::Mss,
            ..Default::default()
        });
        p.germline_mutations = vec![MutationRecord::new("MBD4", Classification::Pathogenic)];
        let a = assess_patient(&p, &ReferenceTables::default()).unwrap();

        assert!(a.summary.io_eligible);
        assert_eq!(a.summary.confidence, ConfidenceTier::Medium);
        let selected = a.safety.as_ref().map(|s| s.selected_drug.as_str());
        assert!(selected.is_some());
        assert_eq!(a.summary.top_recommendation.as_deref(), selected);
        assert_eq!(a.summary.combination_option.as_deref(), Some(IO_PARP_COMBINATION));
        assert_eq!(a.summary.ddr_genes, vec!["MBD4"]);
        assert_eq!(a.summary.next_steps[0], "Confirm TMB with NGS panel");
        assert!(a.summary.next_steps.iter().any(|s| s.contains("IO + PARP combination given DDR deficiency (MBD4)")));
    }

    #[test]
    fn test_summary_measured_tmb_needs_no_confirmation() {
        let ctx = BiomarkerContext {
            mmr_status: MmrStatus::Preserved,
            msi_status_inferred: MsiStatus::Mss,
            measured_tmb: Some(14.0),
            ..Default::default()
        };
        let a = assess_patient(&profile(ctx), &ReferenceTables::default()).unwrap();

        assert!(a.summary.io_eligible);
        assert!(a.summary.top_recommendation.is_some());
        assert!(a.summary.combination_option.is_none());
        assert!(a.summary.ddr_genes.is_empty());
        assert!(!a.summary.next_steps.iter().any(|s| s.contains("TMB")));
        assert!(a.summary.next_steps.contains(&"Discuss clinical trial options".to_string()));
    }

    #[test]
    fn test_summary_brca_lesion_counts_as_ddr() {
        let ctx = BiomarkerContext {
            pd_l1_status: PdL1Status::Positive,
            pd_l1_cps: Some(12.0),
            measured_tmb: Some(3.0),
            mutations: vec![MutationRecord::new("brca2", Classification::Pathogenic)],
            ..Default::default()
        };
        let a = assess_patient(&profile(ctx), &ReferenceTables::default()).unwrap();
        assert_eq!(a.summary.ddr_genes, vec!["BRCA2"]);
        assert!(a.summary.combination_option.is_some());
    }

    #[test]
    fn test_summary_ineligible_has_no_recommendation() {
        let ctx = BiomarkerContext {
            pd_l1_status: PdL1Status::Negative,
            mmr_status: MmrStatus::Preserved,
            msi_status_inferred: MsiStatus::Mss,
            measured_tmb: Some(2.0),
            mutations: vec![MutationRecord::new("BRCA1", Classification::Pathogenic)],
            ..Default::default()
        };
        let a = assess_patient(&profile(ctx), &ReferenceTables::default()).unwrap();
        assert!(a.summary.top_recommendation.is_none());
        assert!(a.summary.combination_option.is_none());
        assert!(a.summary.next_steps[0].starts_with("IO not indicated"));
    }

    #[test]
    fn test_io_free_catalogue_degrades_without_failing() {
        let mut tables = ReferenceTables::default();
        tables.candidates = vec![CandidateDrug {
            drug_id: "olaparib".into(),
            therapy: Therapy::new("parp_inhibitor", "parp1/2"),
            base_efficacy: 0.40,
            base_confidence: 0.70,
        }];
        let ctx = BiomarkerContext { measured_tmb: Some(20.0), ..Default::default() };
        let a = assess_patient(&profile(ctx), &tables).unwrap();

        assert!(a.verdict.eligible);
        assert_eq!(a.efficacy_ranking.len(), 1);
        assert!(a.safety.is_none());
        assert!(a.notes.iter().any(|n| n.contains("no IO drug")));
        assert!(a.summary.top_recommendation.is_none());
    }

    #[test]
    fn test_unprofiled_io_catalogue_degrades_without_failing() {
        let mut tables = ReferenceTables::default();
        tables.drug_profiles.clear();
        let ctx = BiomarkerContext { measured_tmb: Some(20.0), ..Default::default() };
        let a = assess_patient(&profile(ctx), &tables).unwrap();

        assert!(a.safety.is_none());
        assert!(a.notes.iter().any(|n| n.contains("no safety profile")));
        // Falls back to the best-ranked IO drug.
        assert_eq!(a.summary.top_recommendation.as_deref(), Some(a.efficacy_ranking[0].drug_id.as_str()));
    }

    #[test]
    fn test_blank_patient_id_is_invalid_input() {
        let mut p = profile(BiomarkerContext::default());
        p.patient_id = "   ".into();
        let err = assess_patient(&p, &ReferenceTables::default()).unwrap_err();
        assert!(matches!(err, IoGateError::InvalidInput(_)));
    }
}
