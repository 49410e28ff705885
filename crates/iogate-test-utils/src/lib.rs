//! Shared fixtures and builders for iogate tests.

use iogate_common::biomarkers::{
    BiomarkerContext, Classification, GermlineRecord, GermlineStatus, MmrStatus, MsiStatus,
    MutationRecord, PdL1Status, Zygosity,
};

/// Shorthand for a mutation record with a parsed classification.
pub fn mutation(gene: &str, classification: &str) -> MutationRecord {
    MutationRecord::new(gene, Classification::parse(classification))
}

/// Fluent builder over [`BiomarkerContext`].
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    ctx: BiomarkerContext,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// MSS tumour with preserved MMR and nothing else known.
    pub fn mss() -> Self {
        Self::new().mmr(MmrStatus::Preserved).msi(MsiStatus::Mss)
    }

    pub fn pd_l1(mut self, status: PdL1Status, cps: Option<f64>) -> Self {
        self.ctx.pd_l1_status = status;
        self.ctx.pd_l1_cps = cps;
        self
    }

    pub fn mmr(mut self, status: MmrStatus) -> Self {
        self.ctx.mmr_status = status;
        self
    }

    pub fn msi(mut self, status: MsiStatus) -> Self {
        self.ctx.msi_status_inferred = status;
        self
    }

    pub fn tmb(mut self, tmb: Option<f64>) -> Self {
        self.ctx.measured_tmb = tmb;
        self
    }

    pub fn germline_status(mut self, status: GermlineStatus) -> Self {
        self.ctx.germline_status = status;
        self
    }

    /// Add to the nested germline record, creating it if needed.
    pub fn germline_mutation(mut self, gene: &str, classification: &str) -> Self {
        self.ctx
            .germline
            .get_or_insert_with(GermlineRecord::default)
            .mutations
            .push(mutation(gene, classification));
        self
    }

    /// Add to the flat tumour mutation list.
    pub fn tumor_mutation(mut self, gene: &str, classification: &str) -> Self {
        self.ctx.mutations.push(mutation(gene, classification));
        self
    }

    pub fn build(self) -> BiomarkerContext {
        self.ctx
    }
}

/// High-grade serous ovarian carcinoma: germline MBD4 homozygous frameshift,
/// PDGFRA VUS, PD-L1 CPS 10, preserved MMR, TMB awaiting NGS.
pub fn hgsoc_mbd4_context() -> BiomarkerContext {
    let mut mbd4 = mutation("MBD4", "pathogenic");
    mbd4.variant = Some("c.1293delA".to_string());
    mbd4.protein_change = Some("p.K431Nfs*54".to_string());
    mbd4.zygosity = Some(Zygosity::Homozygous);

    let mut pdgfra = mutation("PDGFRA", "VUS");
    pdgfra.variant = Some("c.2263T>C".to_string());
    pdgfra.zygosity = Some(Zygosity::Heterozygous);

    BiomarkerContext {
        pd_l1_status: PdL1Status::Positive,
        pd_l1_cps: Some(10.0),
        mmr_status: MmrStatus::Preserved,
        msi_status_inferred: MsiStatus::Mss,
        measured_tmb: None,
        germline_status: GermlineStatus::Positive,
        germline: Some(GermlineRecord {
            status: GermlineStatus::Positive,
            mutations: vec![mbd4, pdgfra],
        }),
        mutations: vec![],
    }
}

/// The same profile in the JSON shape an upstream loader produces.
pub fn hgsoc_mbd4_profile_json() -> serde_json::Value {
    serde_json::json!({
        "patient_id": "HGSOC-01",
        "age": 43,
        "autoimmune_history": [],
        "context": {
            "pd_l1_status": "POSITIVE",
            "pd_l1_cps": 10,
            "mmr_status": "PRESERVED",
            "msi_status_inferred": "MSS",
            "tmb": null,
            "germline_status": "POSITIVE",
            "germline": {
                "status": "POSITIVE",
                "mutations": [
                    {"gene": "MBD4", "variant": "c.1293delA", "zygosity": "homozygous", "classification": "pathogenic"},
                    {"gene": "PDGFRA", "variant": "c.2263T>C", "zygosity": "heterozygous", "classification": "VUS"}
                ]
            }
        }
    })
}

/// The four-drug safety panel: two PD-1 monotherapies, CTLA-4 and the combination.
pub fn checkpoint_panel() -> Vec<String> {
    ["pembrolizumab", "nivolumab", "ipilimumab", "nivolumab_ipilimumab"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
