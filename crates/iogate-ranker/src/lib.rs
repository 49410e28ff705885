//! iogate-ranker: IO eligibility, efficacy gating and safety selection.
//!
//! Every entry point is a pure function of its inputs and the read-only
//! reference tables, so calls can run concurrently without locking.

pub mod gates;
pub mod efficacy;
pub mod eligibility;
pub mod safety;
pub mod recommend;

pub use efficacy::{apply, apply_gates, EfficacyResult, RationaleEntry};
pub use eligibility::{determine, determine_for_context, EligibilityVerdict};
pub use gates::{Gate, GateEvaluation, GateEvaluator, GateId, GATE_PRIORITY};
pub use recommend::{
    assess_patient, rank_by_efficacy, summarise, AssessmentSummary, IoAssessment, PatientProfile,
    RankedCandidate, IO_PARP_COMBINATION,
};
pub use safety::{compare_by_safety, select_safest, RiskModifiers, SafetySelection};
