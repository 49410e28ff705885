//! Static reference tables: drug toxicity profiles, the candidate IO
//! catalogue, the hypermutator and DNA-damage-repair gene sets and the
//! fixed gate constants.
//!
//! Tables are loaded once at start-up (YAML, JSON or TOML), normalised and
//! validated, then shared read-only by every evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoGateError, Result};
use crate::therapy::Therapy;

// ── Gate constants ────────────────────────────────────────────────────────────

/// Measured TMB at or above this (mut/Mb) is TMB-high.
pub const TMB_HIGH_THRESHOLD: f64 = 10.0;
/// PD-L1 CPS at or above this is PD-L1 positive for IO eligibility.
pub const PD_L1_CPS_POSITIVE: f64 = 1.0;
/// PD-L1 CPS at or above this is the high-expression tier.
pub const PD_L1_CPS_HIGH: f64 = 10.0;

pub const TMB_BOOST: f64 = 1.35;
pub const HYPERMUTATOR_BOOST: f64 = 1.25;
pub const MSI_BOOST: f64 = 1.30;
pub const PD_L1_HIGH_BOOST: f64 = 1.20;
pub const PD_L1_MEDIUM_BOOST: f64 = 1.10;

/// irAE risk multiplier applied when any autoimmune history is recorded.
pub const AUTOIMMUNE_RISK_MULTIPLIER: f64 = 2.0;

// ── Drug safety profiles ──────────────────────────────────────────────────────

/// Checkpoint target of a drug or combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrugTarget {
    #[serde(rename = "PD-1")]
    Pd1,
    #[serde(rename = "PD-L1")]
    PdL1,
    #[serde(rename = "CTLA-4")]
    Ctla4,
    #[serde(rename = "PD-1 + CTLA-4")]
    Pd1Ctla4,
    #[serde(rename = "PD-L1 + CTLA-4")]
    PdL1Ctla4,
}

impl DrugTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrugTarget::Pd1       => "PD-1",
            DrugTarget::PdL1      => "PD-L1",
            DrugTarget::Ctla4     => "CTLA-4",
            DrugTarget::Pd1Ctla4  => "PD-1 + CTLA-4",
            DrugTarget::PdL1Ctla4 => "PD-L1 + CTLA-4",
        }
    }

    /// PD-1 or PD-L1 monotherapy.
    pub fn is_pd_axis_monotherapy(&self) -> bool {
        matches!(self, DrugTarget::Pd1 | DrugTarget::PdL1)
    }

    /// CTLA-4 monotherapy and every CTLA-4 combination.
    pub fn is_high_risk_tier(&self) -> bool {
        !self.is_pd_axis_monotherapy()
    }

    /// Organ systems to watch first once a drug with this target is started.
    pub fn monitoring_priority(&self) -> &'static [&'static str] {
        match self {
            DrugTarget::Pd1   => &["pneumonitis", "colitis", "thyroiditis"],
            DrugTarget::PdL1  => &["pneumonitis", "thyroiditis", "hepatitis"],
            DrugTarget::Ctla4 => &["colitis", "hepatitis", "hypophysitis", "dermatitis"],
            DrugTarget::Pd1Ctla4 | DrugTarget::PdL1Ctla4 => {
                &["colitis", "hepatitis", "pneumonitis", "hypophysitis", "myocarditis"]
            }
        }
    }
}

impl std::fmt::Display for DrugTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugSafetyProfile {
    pub brand_name: String,
    pub target: DrugTarget,
    /// Literature grade ≥3 irAE rate, in [0, 1].
    pub irae_grade3plus_rate: f64,
}

// ── Candidate catalogue ───────────────────────────────────────────────────────

/// An IO drug considered for efficacy ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDrug {
    pub drug_id: String,
    #[serde(flatten)]
    pub therapy: Therapy,
    pub base_efficacy: f64,
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,
}

fn default_base_confidence() -> f64 { 0.70 }

// ── Reference tables ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub drug_profiles: BTreeMap<String, DrugSafetyProfile>,
    pub hypermutator_genes: BTreeSet<String>,
    /// DNA-damage-repair genes whose pathogenic loss supports an IO + PARP
    /// combination. Hypermutator genes always count as well.
    #[serde(default = "default_ddr_genes")]
    pub ddr_genes: BTreeSet<String>,
    #[serde(default)]
    pub candidates: Vec<CandidateDrug>,
}

fn default_ddr_genes() -> BTreeSet<String> {
    ["ATM", "BRCA1", "BRCA2", "BRIP1", "CHEK2", "PALB2", "RAD51C", "RAD51D"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

/// Canonical drug identifier: lower-case words joined by `_`.
/// `"Nivolumab + Ipilimumab"` → `"nivolumab_ipilimumab"`.
pub fn normalise_drug_id(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

fn profile(brand: &str, target: DrugTarget, rate: f64) -> DrugSafetyProfile {
    DrugSafetyProfile {
        brand_name: brand.to_string(),
        target,
        irae_grade3plus_rate: rate,
    }
}

fn candidate(drug_id: &str, moa: &str, base_efficacy: f64) -> CandidateDrug {
    CandidateDrug {
        drug_id: drug_id.to_string(),
        therapy: Therapy::new("checkpoint_inhibitor", moa),
        base_efficacy,
        base_confidence: default_base_confidence(),
    }
}

impl Default for ReferenceTables {
    /// Built-in literature table of FDA-approved checkpoint inhibitors.
    fn default() -> Self {
        let drug_profiles = BTreeMap::from([
            ("avelumab".to_string(),               profile("Bavencio", DrugTarget::PdL1, 0.10)),
            ("pembrolizumab".to_string(),          profile("Keytruda", DrugTarget::Pd1, 0.12)),
            ("nivolumab".to_string(),              profile("Opdivo", DrugTarget::Pd1, 0.13)),
            ("durvalumab".to_string(),             profile("Imfinzi", DrugTarget::PdL1, 0.14)),
            ("atezolizumab".to_string(),           profile("Tecentriq", DrugTarget::PdL1, 0.15)),
            ("dostarlimab".to_string(),            profile("Jemperli", DrugTarget::Pd1, 0.16)),
            ("cemiplimab".to_string(),             profile("Libtayo", DrugTarget::Pd1, 0.17)),
            ("ipilimumab".to_string(),             profile("Yervoy", DrugTarget::Ctla4, 0.35)),
            ("durvalumab_tremelimumab".to_string(), profile("Imfinzi + Imjudo", DrugTarget::PdL1Ctla4, 0.38)),
            ("nivolumab_ipilimumab".to_string(),   profile("Opdivo + Yervoy", DrugTarget::Pd1Ctla4, 0.55)),
        ]);

        let hypermutator_genes = ["MBD4", "POLE", "POLD1"]
            .iter()
            .map(|g| g.to_string())
            .collect();

        let candidates = vec![
            candidate("pembrolizumab", "anti-pd1", 0.55),
            candidate("nivolumab", "anti-pd1", 0.52),
            candidate("dostarlimab", "anti-pd1", 0.50),
            candidate("atezolizumab", "anti-pdl1", 0.48),
            candidate("cemiplimab", "anti-pd1", 0.47),
            candidate("durvalumab", "anti-pdl1", 0.45),
            candidate("avelumab", "anti-pdl1", 0.42),
            candidate("ipilimumab", "anti-ctla4", 0.35),
            candidate("nivolumab_ipilimumab", "anti-pd1+anti-ctla4", 0.58),
        ];

        Self {
            drug_profiles,
            hypermutator_genes,
            ddr_genes: default_ddr_genes(),
            candidates,
        }
    }
}

impl ReferenceTables {
    /// Load from YAML file
    pub fn from_yaml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let tables: Self = serde_yaml::from_str(content)?;
        tables.finalise()
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let tables: Self = serde_json::from_str(&content)?;
        tables.finalise()
    }

    /// Load from TOML file
    pub fn from_toml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let tables: Self = toml::from_str(&content)?;
        tables.finalise()
    }

    /// Pick the loader from the file extension.
    pub fn from_path(path: &str) -> Result<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            Some("json") => Self::from_json(path),
            Some("toml") => Self::from_toml(path),
            _ => Err(IoGateError::ReferenceTable(format!(
                "unsupported reference table format: {path}"
            ))),
        }
    }

    fn finalise(mut self) -> Result<Self> {
        self.normalise();
        self.validate()?;
        tracing::debug!(
            drugs = self.drug_profiles.len(),
            genes = self.hypermutator_genes.len(),
            candidates = self.candidates.len(),
            "Reference tables loaded"
        );
        Ok(self)
    }

    /// Canonicalise drug ids (lower-case) and gene symbols (upper-case).
    pub fn normalise(&mut self) {
        self.drug_profiles = std::mem::take(&mut self.drug_profiles)
            .into_iter()
            .map(|(id, p)| (normalise_drug_id(&id), p))
            .collect();
        self.hypermutator_genes = normalise_genes(std::mem::take(&mut self.hypermutator_genes));
        self.ddr_genes = normalise_genes(std::mem::take(&mut self.ddr_genes));
        for c in &mut self.candidates {
            c.drug_id = normalise_drug_id(&c.drug_id);
        }
    }

    /// Reject tables no safe output can be produced from.
    pub fn validate(&self) -> Result<()> {
        if self.drug_profiles.is_empty() {
            return Err(IoGateError::ReferenceTable("drug safety table is empty".into()));
        }
        if self.hypermutator_genes.is_empty() {
            return Err(IoGateError::ReferenceTable("hypermutator gene set is empty".into()));
        }
        for (id, p) in &self.drug_profiles {
            if !(0.0..=1.0).contains(&p.irae_grade3plus_rate) {
                return Err(IoGateError::ReferenceTable(format!(
                    "{id}: irae_grade3plus_rate {} outside [0, 1]",
                    p.irae_grade3plus_rate
                )));
            }
        }
        for c in &self.candidates {
            if !(c.base_efficacy > 0.0 && c.base_efficacy <= 1.0) {
                return Err(IoGateError::ReferenceTable(format!(
                    "{}: base_efficacy {} outside (0, 1]",
                    c.drug_id, c.base_efficacy
                )));
            }
            if !(0.0..=1.0).contains(&c.base_confidence) {
                return Err(IoGateError::ReferenceTable(format!(
                    "{}: base_confidence {} outside [0, 1]",
                    c.drug_id, c.base_confidence
                )));
            }
            if !self.drug_profiles.contains_key(&c.drug_id) {
                return Err(IoGateError::ReferenceTable(format!(
                    "candidate {} has no safety profile",
                    c.drug_id
                )));
            }
        }
        Ok(())
    }

    /// Look up a profile by any spelling of the drug id.
    pub fn profile(&self, drug_id: &str) -> Option<&DrugSafetyProfile> {
        self.drug_profiles.get(&normalise_drug_id(drug_id))
    }

    /// Every gene whose pathogenic loss counts as DNA-repair deficiency.
    pub fn ddr_deficiency_genes(&self) -> BTreeSet<String> {
        self.ddr_genes.union(&self.hypermutator_genes).cloned().collect()
    }
}

fn normalise_genes(genes: BTreeSet<String>) -> BTreeSet<String> {
    genes
        .into_iter()
        .map(|g| g.trim().to_ascii_uppercase())
        .filter(|g| !g.is_empty())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_tables_validate() {
        let tables = ReferenceTables::default();
        assert!(tables.validate().is_ok());
        let ddr = tables.ddr_deficiency_genes();
        assert!(ddr.contains("POLE"));
        assert!(ddr.contains("BRCA2"));
        assert!(!ddr.contains("TP53"));
    }

    #[test]
    fn test_drug_id_normalisation() {
        assert_eq!(normalise_drug_id("Nivolumab + Ipilimumab"), "nivolumab_ipilimumab");
        assert_eq!(normalise_drug_id("  PEMBROLIZUMAB "), "pembrolizumab");
        assert_eq!(normalise_drug_id("nivolumab_ipilimumab"), "nivolumab_ipilimumab");
    }

    #[test]
    fn test_profile_lookup_any_spelling() {
        let tables = ReferenceTables::default();
        let p = tables.profile("Nivolumab+Ipilimumab").unwrap();
        assert_eq!(p.target, DrugTarget::Pd1Ctla4);
        assert!(tables.profile("olaparib").is_none());
    }

    #[test]
    fn test_high_risk_tier() {
        assert!(!DrugTarget::Pd1.is_high_risk_tier());
        assert!(!DrugTarget::PdL1.is_high_risk_tier());
        assert!(DrugTarget::Ctla4.is_high_risk_tier());
        assert!(DrugTarget::Pd1Ctla4.is_high_risk_tier());
        assert!(DrugTarget::PdL1Ctla4.is_high_risk_tier());
    }

    #[test]
    fn test_empty_gene_set_is_fatal() {
        let yaml = r#"
drug_profiles:
  pembrolizumab: { brand_name: Keytruda, target: PD-1, irae_grade3plus_rate: 0.12 }
hypermutator_genes: []
"#;
        let err = ReferenceTables::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, IoGateError::ReferenceTable(_)));
    }

    #[test]
    fn test_rate_out_of_range_is_fatal() {
        let yaml = r#"
drug_profiles:
  pembrolizumab: { brand_name: Keytruda, target: PD-1, irae_grade3plus_rate: 12 }
hypermutator_genes: [MBD4]
"#;
        assert!(ReferenceTables::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_yaml_load_normalises() {
        let yaml = r#"
drug_profiles:
  Pembrolizumab: { brand_name: Keytruda, target: PD-1, irae_grade3plus_rate: 0.12 }
  "Nivolumab + Ipilimumab": { brand_name: Opdivo + Yervoy, target: PD-1 + CTLA-4, irae_grade3plus_rate: 0.55 }
hypermutator_genes: [mbd4, POLE]
candidates:
  - { drug_id: Pembrolizumab, drug_class: checkpoint_inhibitor, moa: anti-pd1, base_efficacy: 0.5 }
"#;
        let tables = ReferenceTables::from_yaml_str(yaml).unwrap();
        let ids: Vec<&str> = tables.drug_profiles.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["nivolumab_ipilimumab", "pembrolizumab"]);
        assert!(tables.hypermutator_genes.contains("MBD4"));
        assert!(tables.ddr_genes.contains("BRCA1"), "missing ddr_genes falls back to the default set");
        assert_eq!(tables.candidates[0].drug_id, "pembrolizumab");
        assert_eq!(tables.candidates[0].base_confidence, 0.70);
    }

    #[test]
    fn test_candidate_without_profile_is_fatal() {
        let yaml = r#"
drug_profiles:
  pembrolizumab: { brand_name: Keytruda, target: PD-1, irae_grade3plus_rate: 0.12 }
hypermutator_genes: [MBD4]
candidates:
  - { drug_id: olaparib, drug_class: parp_inhibitor, moa: parp, base_efficacy: 0.5 }
"#;
        assert!(ReferenceTables::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let tables = ReferenceTables::default();
        let yaml = serde_yaml::to_string(&tables).unwrap();
        let parsed = ReferenceTables::from_yaml_str(&yaml).unwrap();
        assert_eq!(tables, parsed);
    }
}
