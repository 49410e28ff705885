//! iogate-common: Biomarker types, reference tables and errors shared by
//! the IO decision engines.

pub mod error;
pub mod biomarkers;
pub mod confidence;
pub mod reference;
pub mod therapy;

// Re-export commonly used types
pub use biomarkers::{
    BiomarkerContext, Classification, EvidenceMutation, EvidenceMutations, GermlineRecord,
    GermlineStatus, MmrStatus, MsiStatus, MutationOrigin, MutationRecord, PdL1Status,
    TmbAssessment, Zygosity,
};
pub use confidence::ConfidenceTier;
pub use error::{IoGateError, Result};
pub use reference::{CandidateDrug, DrugSafetyProfile, DrugTarget, ReferenceTables};
pub use therapy::{DrugClass, Mechanism, Therapy};
