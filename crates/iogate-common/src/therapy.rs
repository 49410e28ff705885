/// Drug class and mechanism-of-action vocabulary.
/// These are the only two facts about a drug the gate evaluator needs.

use serde::{Deserialize, Serialize};

fn squash(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Drug class
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DrugClass {
    CheckpointInhibitor,
    ParpInhibitor,
    Chemotherapy,
    TargetedTherapy,
    Other(String),
}

impl DrugClass {
    pub fn as_str(&self) -> &str {
        match self {
            DrugClass::CheckpointInhibitor => "checkpoint_inhibitor",
            DrugClass::ParpInhibitor       => "parp_inhibitor",
            DrugClass::Chemotherapy        => "chemotherapy",
            DrugClass::TargetedTherapy     => "targeted_therapy",
            DrugClass::Other(raw)          => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let key = squash(raw);
        if key.contains("checkpoint") || key == "io" || key == "immunotherapy" {
            DrugClass::CheckpointInhibitor
        } else if key.starts_with("parp") {
            DrugClass::ParpInhibitor
        } else if key.starts_with("chemo") || key == "platinum" {
            DrugClass::Chemotherapy
        } else if key.starts_with("targeted") {
            DrugClass::TargetedTherapy
        } else {
            DrugClass::Other(raw.trim().to_string())
        }
    }
}

impl From<String> for DrugClass {
    fn from(raw: String) -> Self {
        DrugClass::parse(&raw)
    }
}

impl From<DrugClass> for String {
    fn from(value: DrugClass) -> Self {
        value.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Mechanism of action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mechanism {
    AntiPd1,
    AntiPdL1,
    AntiCtla4,
    AntiPd1Ctla4,
    AntiPdL1Ctla4,
    Other(String),
}

impl Mechanism {
    pub fn as_str(&self) -> &str {
        match self {
            Mechanism::AntiPd1       => "anti-pd1",
            Mechanism::AntiPdL1      => "anti-pdl1",
            Mechanism::AntiCtla4     => "anti-ctla4",
            Mechanism::AntiPd1Ctla4  => "anti-pd1+anti-ctla4",
            Mechanism::AntiPdL1Ctla4 => "anti-pdl1+anti-ctla4",
            Mechanism::Other(raw)    => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let key = squash(raw);
        let ctla4 = key.contains("ctla4");
        let pdl1 = key.contains("pdl1");
        let pd1 = key.contains("pd1");
        match (pd1, pdl1, ctla4) {
            (_, true, true)      => Mechanism::AntiPdL1Ctla4,
            (true, false, true)  => Mechanism::AntiPd1Ctla4,
            (_, true, false)     => Mechanism::AntiPdL1,
            (true, false, false) => Mechanism::AntiPd1,
            (false, false, true) => Mechanism::AntiCtla4,
            _                    => Mechanism::Other(raw.trim().to_string()),
        }
    }

    /// Acts on the PD-1/PD-L1 axis (alone or in combination).
    pub fn targets_pd_axis(&self) -> bool {
        matches!(
            self,
            Mechanism::AntiPd1 | Mechanism::AntiPdL1 | Mechanism::AntiPd1Ctla4 | Mechanism::AntiPdL1Ctla4
        )
    }
}

impl From<String> for Mechanism {
    fn from(raw: String) -> Self {
        Mechanism::parse(&raw)
    }
}

impl From<Mechanism> for String {
    fn from(value: Mechanism) -> Self {
        value.as_str().to_string()
    }
}

/// Class plus mechanism of one candidate drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapy {
    pub drug_class: DrugClass,
    pub moa: Mechanism,
}

impl Therapy {
    pub fn new(drug_class: &str, moa: &str) -> Self {
        Self {
            drug_class: DrugClass::parse(drug_class),
            moa: Mechanism::parse(moa),
        }
    }

    /// Biomarker gates only apply to checkpoint inhibitors and anti-PD-(L)1 agents.
    pub fn is_immunotherapy(&self) -> bool {
        self.drug_class == DrugClass::CheckpointInhibitor || self.moa.targets_pd_axis()
    }
}
