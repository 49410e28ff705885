//! JSON report envelope printed by `iogate assess`.

use chrono::{DateTime, Utc};
use iogate_common::reference::ReferenceTables;
use iogate_ranker::recommend::{assess_patient, IoAssessment, PatientProfile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub engine_version: String,
    /// Path of the loaded tables, or "builtin".
    pub reference_tables: String,
    pub assessment: IoAssessment,
}

impl Report {
    pub fn build(
        profile: &PatientProfile,
        tables: &ReferenceTables,
        tables_source: &str,
    ) -> anyhow::Result<Self> {
        let assessment = assess_patient(profile, tables)?;
        Ok(Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            reference_tables: tables_source.to_string(),
            assessment,
        })
    }

    pub fn to_json(&self, pretty: bool) -> anyhow::Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(out)
    }
}

/// Parse a patient profile document.
pub fn parse_profile(content: &str) -> anyhow::Result<PatientProfile> {
    let profile: PatientProfile = serde_json::from_str(content)?;
    profile.validate()?;
    Ok(profile)
}
