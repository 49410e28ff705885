//! Biomarker context types describing one tumour/patient sample.
//!
//! Status enums parse leniently from upstream strings (`"positive"`,
//! `"MSI_H"`, `"Deficient"` ...) and serialise to a canonical upper-case
//! form. Anything unparseable becomes `Unknown`, which every engine treats
//! as missing data rather than an error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::reference::TMB_HIGH_THRESHOLD;

fn canonical(raw: &str) -> String {
    raw.trim()
        .to_ascii_uppercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PdL1Status {
    Positive,
    Negative,
    #[default]
    Unknown,
}

impl PdL1Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdL1Status::Positive => "POSITIVE",
            PdL1Status::Negative => "NEGATIVE",
            PdL1Status::Unknown  => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match canonical(raw).as_str() {
            "POSITIVE" | "POS" | "+" => PdL1Status::Positive,
            "NEGATIVE" | "NEG" | "-" => PdL1Status::Negative,
            _                        => PdL1Status::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MmrStatus {
    Preserved,
    Deficient,
    Lost,
    #[default]
    Unknown,
}

impl MmrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MmrStatus::Preserved => "PRESERVED",
            MmrStatus::Deficient => "DEFICIENT",
            MmrStatus::Lost      => "LOST",
            MmrStatus::Unknown   => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match canonical(raw).as_str() {
            "PRESERVED" | "INTACT" | "PMMR" | "PROFICIENT" => MmrStatus::Preserved,
            "DEFICIENT" | "DMMR"                          => MmrStatus::Deficient,
            "LOST" | "LOSS"                               => MmrStatus::Lost,
            _                                             => MmrStatus::Unknown,
        }
    }

    /// DEFICIENT and LOST both mean mismatch-repair deficiency on IHC.
    pub fn is_deficient(&self) -> bool {
        matches!(self, MmrStatus::Deficient | MmrStatus::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MsiStatus {
    Mss,
    MsiHigh,
    #[default]
    Unknown,
}

impl MsiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsiStatus::Mss     => "MSS",
            MsiStatus::MsiHigh => "MSI-H",
            MsiStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match canonical(raw).as_str() {
            "MSS" | "MSI-L" | "STABLE"       => MsiStatus::Mss,
            "MSI-H" | "MSIH" | "MSI-HIGH"    => MsiStatus::MsiHigh,
            _                                => MsiStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GermlineStatus {
    Positive,
    Negative,
    #[default]
    Unknown,
}

impl GermlineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GermlineStatus::Positive => "POSITIVE",
            GermlineStatus::Negative => "NEGATIVE",
            GermlineStatus::Unknown  => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match canonical(raw).as_str() {
            "POSITIVE" => GermlineStatus::Positive,
            "NEGATIVE" => GermlineStatus::Negative,
            _          => GermlineStatus::Unknown,
        }
    }
}

/// Variant classification as reported by the upstream pipeline.
///
/// Only `Pathogenic` is a triggering classification. Strings outside the
/// known vocabulary are kept verbatim in `Unrecognized` so they can be
/// surfaced in the rationale trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Classification {
    Pathogenic,
    LikelyPathogenic,
    Vus,
    LikelyBenign,
    Benign,
    Unrecognized(String),
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Classification::Pathogenic       => "pathogenic",
            Classification::LikelyPathogenic => "likely_pathogenic",
            Classification::Vus              => "VUS",
            Classification::LikelyBenign     => "likely_benign",
            Classification::Benign           => "benign",
            Classification::Unrecognized(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match canonical(raw).as_str() {
            "PATHOGENIC"                          => Classification::Pathogenic,
            "LIKELY-PATHOGENIC"                   => Classification::LikelyPathogenic,
            "VUS" | "UNCERTAIN-SIGNIFICANCE"
            | "UNCERTAIN"                         => Classification::Vus,
            "LIKELY-BENIGN"                       => Classification::LikelyBenign,
            "BENIGN"                              => Classification::Benign,
            _                                     => Classification::Unrecognized(raw.to_string()),
        }
    }

    pub fn is_pathogenic(&self) -> bool {
        matches!(self, Classification::Pathogenic)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Classification::Unrecognized(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zygosity {
    Homozygous,
    Heterozygous,
    Hemizygous,
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl From<String> for $ty {
            fn from(raw: String) -> Self { <$ty>::parse(&raw) }
        }
        impl From<$ty> for String {
            fn from(value: $ty) -> Self { value.as_str().to_string() }
        }
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

string_conversions!(PdL1Status, MmrStatus, MsiStatus, GermlineStatus, Classification);

// ---------------------------------------------------------------------------
// Mutation records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub gene: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zygosity: Option<Zygosity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_change: Option<String>,
}

impl MutationRecord {
    pub fn new(gene: &str, classification: Classification) -> Self {
        Self {
            gene: gene.to_string(),
            classification,
            zygosity: None,
            variant: None,
            protein_change: None,
        }
    }
}

/// Germline panel result nested inside a tumour context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GermlineRecord {
    #[serde(default)]
    pub status: GermlineStatus,
    #[serde(default)]
    pub mutations: Vec<MutationRecord>,
}

// ---------------------------------------------------------------------------
// Biomarker context
// ---------------------------------------------------------------------------

/// Immutable description of one tumour/patient sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerContext {
    #[serde(default)]
    pub pd_l1_status: PdL1Status,
    #[serde(default)]
    pub pd_l1_cps: Option<f64>,
    #[serde(default)]
    pub mmr_status: MmrStatus,
    #[serde(default, alias = "msi_status")]
    pub msi_status_inferred: MsiStatus,
    /// Mutations per megabase; `None` means not measured.
    #[serde(default, alias = "tmb")]
    pub measured_tmb: Option<f64>,
    #[serde(default)]
    pub germline_status: GermlineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub germline: Option<GermlineRecord>,
    #[serde(default)]
    pub mutations: Vec<MutationRecord>,
}

fn usable_measure(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

impl BiomarkerContext {
    /// PD-L1 CPS, with negative or non-finite values treated as absent.
    pub fn cps(&self) -> Option<f64> {
        usable_measure(self.pd_l1_cps)
    }

    /// Measured TMB, with negative or non-finite values treated as absent.
    pub fn tmb(&self) -> Option<f64> {
        usable_measure(self.measured_tmb)
    }

    /// Top-level germline status, falling back to the nested germline record.
    pub fn effective_germline_status(&self) -> GermlineStatus {
        match (self.germline_status, &self.germline) {
            (GermlineStatus::Unknown, Some(record)) => record.status,
            (status, _) => status,
        }
    }

    /// MSI-H by MMR immunohistochemistry.
    pub fn msi_high_by_ihc(&self) -> bool {
        self.mmr_status.is_deficient()
    }

    /// MSI-H by either IHC or an upstream inference.
    pub fn msi_high(&self) -> bool {
        self.msi_high_by_ihc() || self.msi_status_inferred == MsiStatus::MsiHigh
    }
}

// ---------------------------------------------------------------------------
// Evidence mutation list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOrigin {
    /// Nested `germline.mutations` of the context.
    GermlineRecord,
    /// Flat `mutations` list of the context.
    Tumor,
    /// Germline mutations handed to the evaluator separately.
    SuppliedGermline,
}

impl MutationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOrigin::GermlineRecord   => "germline record",
            MutationOrigin::Tumor            => "tumour panel",
            MutationOrigin::SuppliedGermline => "supplied germline panel",
        }
    }
}

impl std::fmt::Display for MutationOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMutation {
    /// Upper-cased HGNC symbol.
    pub gene: String,
    pub classification: Classification,
    pub origin: MutationOrigin,
}

/// The single canonical mutation list the engines read from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMutations {
    entries: Vec<EvidenceMutation>,
}

impl EvidenceMutations {
    /// Merge every mutation source once, at the boundary.
    pub fn assemble(
        context: &BiomarkerContext,
        extra_germline: Option<&[MutationRecord]>,
    ) -> Self {
        let nested = context
            .germline
            .iter()
            .flat_map(|g| g.mutations.iter())
            .map(|m| (m, MutationOrigin::GermlineRecord));
        let flat = context.mutations.iter().map(|m| (m, MutationOrigin::Tumor));
        let supplied = extra_germline
            .unwrap_or_default()
            .iter()
            .map(|m| (m, MutationOrigin::SuppliedGermline));

        let entries = nested
            .chain(flat)
            .chain(supplied)
            .filter(|(m, _)| !m.gene.trim().is_empty())
            .map(|(m, origin)| EvidenceMutation {
                gene: m.gene.trim().to_ascii_uppercase(),
                classification: m.classification.clone(),
                origin,
            })
            .collect();

        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvidenceMutation> {
        self.entries.iter()
    }

    /// Distinct sources of pathogenic calls for `gene`, in evidence order.
    pub fn pathogenic_origins(&self, gene: &str) -> Vec<MutationOrigin> {
        let mut origins = Vec::new();
        for m in &self.entries {
            if m.gene == gene && m.classification.is_pathogenic() && !origins.contains(&m.origin) {
                origins.push(m.origin);
            }
        }
        origins
    }

    /// Distinct genes from `genes` carrying a pathogenic call, in first-seen order.
    pub fn pathogenic_in(&self, genes: &BTreeSet<String>) -> Vec<String> {
        let mut hits: Vec<String> = Vec::new();
        for m in &self.entries {
            if m.classification.is_pathogenic() && genes.contains(&m.gene) && !hits.contains(&m.gene) {
                hits.push(m.gene.clone());
            }
        }
        hits
    }

    /// Entries in `genes` whose classification could not be parsed.
    pub fn unrecognized_in<'a>(
        &'a self,
        genes: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a EvidenceMutation> + 'a {
        self.entries
            .iter()
            .filter(move |m| !m.classification.is_recognized() && genes.contains(&m.gene))
    }
}

// ---------------------------------------------------------------------------
// TMB assessment
// ---------------------------------------------------------------------------

/// Measured-versus-inferred TMB call shared by both decision engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmbAssessment {
    pub measured: Option<f64>,
    /// Pathogenic hypermutator genes, in evidence order.
    pub inferred_genes: Vec<String>,
}

impl TmbAssessment {
    pub fn assess(
        context: &BiomarkerContext,
        evidence: &EvidenceMutations,
        hypermutator_genes: &BTreeSet<String>,
    ) -> Self {
        Self {
            measured: context.tmb(),
            inferred_genes: evidence.pathogenic_in(hypermutator_genes),
        }
    }

    pub fn measured_high(&self) -> bool {
        self.measured.is_some_and(|tmb| tmb >= TMB_HIGH_THRESHOLD)
    }

    /// Inference only counts when measurement did not already establish TMB-H.
    pub fn inferred_high(&self) -> bool {
        !self.measured_high() && !self.inferred_genes.is_empty()
    }

    pub fn estimate_label(&self) -> String {
        if let Some(tmb) = self.measured.filter(|_| self.measured_high()) {
            format!("MEASURED {tmb:.1} mut/Mb")
        } else if self.inferred_high() {
            format!("LIKELY ELEVATED (>{TMB_HIGH_THRESHOLD:.0} mut/Mb)")
        } else if let Some(tmb) = self.measured {
            format!("MEASURED {tmb:.1} mut/Mb")
        } else {
            "UNKNOWN".to_string()
        }
    }
}
