//! IO eligibility determination.
//!
//! Eligible = PD-L1 CPS ≥ 1  OR  MSI-H/dMMR  OR  TMB-H (measured or inferred).
//!
//! Confidence tier and primary reason follow one precedence:
//! PD-L1 CPS ≥ 10 → MSI-H → TMB-H → "No qualifying biomarker". A patient
//! eligible through PD-L1 CPS 1-9 alone is eligible at LOW confidence with
//! the fallback reason.

use iogate_common::biomarkers::{
    BiomarkerContext, EvidenceMutations, MmrStatus, MsiStatus, MutationRecord, PdL1Status,
    TmbAssessment,
};
use iogate_common::confidence::ConfidenceTier;
use iogate_common::reference::{ReferenceTables, PD_L1_CPS_HIGH, PD_L1_CPS_POSITIVE};
use serde::{Deserialize, Serialize};

/// PD-L1 immunohistochemistry result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdL1Signal {
    pub status: PdL1Status,
    pub cps: Option<f64>,
}

/// Mismatch-repair / microsatellite status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MsiSignal {
    pub mmr_status: MmrStatus,
    pub msi_inferred: MsiStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualifyingBiomarkers {
    pub pd_l1: bool,
    pub msi_h: bool,
    pub tmb_h: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerAssessment {
    pub eligible: bool,
    pub confidence: ConfidenceTier,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmbBiomarkerAssessment {
    #[serde(flatten)]
    pub assessment: BiomarkerAssessment,
    pub measured: Option<f64>,
    pub estimated: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hypermutator_genes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerAssessments {
    pub pd_l1: BiomarkerAssessment,
    pub msi: BiomarkerAssessment,
    pub tmb: TmbBiomarkerAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub confidence_tier: ConfidenceTier,
    pub primary_reason: String,
    pub qualifying_biomarkers: QualifyingBiomarkers,
    pub assessments: BiomarkerAssessments,
}

fn assess_pd_l1(pd_l1: &PdL1Signal) -> BiomarkerAssessment {
    let cps = pd_l1.cps.filter(|c| c.is_finite() && *c >= 0.0);
    let (eligible, confidence) = match (pd_l1.status, cps) {
        (PdL1Status::Positive, Some(c)) if c >= PD_L1_CPS_HIGH => (true, ConfidenceTier::High),
        (PdL1Status::Positive, Some(c)) if c >= PD_L1_CPS_POSITIVE => (true, ConfidenceTier::Medium),
        _ => (false, ConfidenceTier::Low),
    };
    let evidence = match (pd_l1.status, cps) {
        (_, _) if eligible => {
            "FDA approved: pembrolizumab for PD-L1+ solid tumors (CPS >= 1)".to_string()
        }
        (PdL1Status::Positive, Some(c)) => format!("PD-L1 positive but CPS {c} below 1"),
        (PdL1Status::Positive, None) => "PD-L1 positive without a CPS".to_string(),
        (status, _) => format!("PD-L1 {status}"),
    };
    BiomarkerAssessment { eligible, confidence, evidence }
}

fn assess_msi(msi: &MsiSignal) -> BiomarkerAssessment {
    if msi.mmr_status.is_deficient() {
        BiomarkerAssessment {
            eligible: true,
            confidence: ConfidenceTier::High,
            evidence: format!(
                "MMR {} on IHC; FDA approved: pembrolizumab for MSI-H/dMMR solid tumors",
                msi.mmr_status
            ),
        }
    } else if msi.msi_inferred == MsiStatus::MsiHigh {
        BiomarkerAssessment {
            eligible: true,
            confidence: ConfidenceTier::Medium,
            evidence: "Inferred MSI-H; confirm with MMR IHC or MSI PCR".to_string(),
        }
    } else {
        // Intact MMR on IHC is a reliable negative.
        let confidence = if msi.mmr_status == MmrStatus::Preserved {
            ConfidenceTier::High
        } else {
            ConfidenceTier::Low
        };
        BiomarkerAssessment {
            eligible: false,
            confidence,
            evidence: format!("MMR {}, MSI {}", msi.mmr_status, msi.msi_inferred),
        }
    }
}

fn assess_tmb(tmb: &TmbAssessment) -> TmbBiomarkerAssessment {
    let (eligible, confidence, evidence) = if tmb.measured_high() {
        (true, ConfidenceTier::High, "KEYNOTE-158: TMB-H (>= 10 mut/Mb) tumors respond to pembrolizumab".to_string())
    } else if tmb.inferred_high() {
        (
            true,
            ConfidenceTier::Medium,
            format!(
                "Pathogenic {} lesion implies DNA-repair deficiency and hypermutation; \
                 confirm TMB with an NGS panel",
                tmb.inferred_genes.join("/")
            ),
        )
    } else if tmb.measured.is_some() {
        (false, ConfidenceTier::High, "Measured TMB below 10 mut/Mb".to_string())
    } else {
        (false, ConfidenceTier::Low, "Awaiting NGS for TMB measurement".to_string())
    };
    TmbBiomarkerAssessment {
        assessment: BiomarkerAssessment { eligible, confidence, evidence },
        measured: tmb.measured,
        estimated: tmb.estimate_label(),
        hypermutator_genes: tmb.inferred_genes.clone(),
    }
}

/// Combine PD-L1, MSI and TMB signals into one verdict.
pub fn determine(pd_l1: &PdL1Signal, msi: &MsiSignal, tmb: &TmbAssessment) -> EligibilityVerdict {
    let pd_l1_assessment = assess_pd_l1(pd_l1);
    let msi_assessment = assess_msi(msi);
    let tmb_assessment = assess_tmb(tmb);

    let qualifying = QualifyingBiomarkers {
        pd_l1: pd_l1_assessment.eligible,
        msi_h: msi_assessment.eligible,
        tmb_h: tmb_assessment.assessment.eligible,
    };
    let eligible = qualifying.pd_l1 || qualifying.msi_h || qualifying.tmb_h;

    let (confidence_tier, primary_reason) =
        if qualifying.pd_l1 && pd_l1_assessment.confidence == ConfidenceTier::High {
            (ConfidenceTier::High, "PD-L1 CPS >= 10".to_string())
        } else if qualifying.msi_h {
            (ConfidenceTier::High, "MSI-H / dMMR".to_string())
        } else if tmb.measured_high() {
            (ConfidenceTier::Medium, "TMB-H (measured)".to_string())
        } else if tmb.inferred_high() {
            (
                ConfidenceTier::Medium,
                format!("Likely TMB-H ({} deficiency)", tmb.inferred_genes.join("/")),
            )
        } else {
            (ConfidenceTier::Low, "No qualifying biomarker".to_string())
        };

    tracing::debug!(
        eligible,
        tier = confidence_tier.as_str(),
        reason = %primary_reason,
        "IO eligibility determined"
    );

    EligibilityVerdict {
        eligible,
        confidence_tier,
        primary_reason,
        qualifying_biomarkers: qualifying,
        assessments: BiomarkerAssessments {
            pd_l1: pd_l1_assessment,
            msi: msi_assessment,
            tmb: tmb_assessment,
        },
    }
}

/// Assemble all three signals from a context and determine eligibility.
pub fn determine_for_context(
    context: &BiomarkerContext,
    germline_mutations: Option<&[MutationRecord]>,
    tables: &ReferenceTables,
) -> EligibilityVerdict {
    let evidence = EvidenceMutations::assemble(context, germline_mutations);
    let tmb = TmbAssessment::assess(context, &evidence, &tables.hypermutator_genes);
    let pd_l1 = PdL1Signal {
        status: context.pd_l1_status,
        cps: context.cps(),
    };
    let msi = MsiSignal {
        mmr_status: context.mmr_status,
        msi_inferred: context.msi_status_inferred,
    };
    determine(&pd_l1, &msi, &tmb)
}
