// Experiment catalog (ICAT) records

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Summary of one IPTS experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentMetadata {
    pub title: Option<String>,
    pub proposal: Option<String>,
    pub create_time: Option<DateTime<FixedOffset>>,
    pub run_range: Option<String>,
}

/// Metadata of one acquired run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub title: Option<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub duration: Option<f64>,
    pub proton_charge: Option<f64>,
    pub total_counts: Option<f64>,
}

impl RunInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            start_time: None,
            end_time: None,
            duration: None,
            proton_charge: None,
            total_counts: None,
        }
    }
}
