// Plot artifact cache entries

use serde::{Deserialize, Serialize};

/// One row of an I(q) result file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqPoint {
    pub q: f64,
    pub intensity: f64,
    pub error: f64,
}

impl IqPoint {
    pub fn new(q: f64, intensity: f64, error: f64) -> Self {
        Self {
            q,
            intensity,
            error,
        }
    }
}

/// I(qx, qy) grid ready for client-side rendering.
///
/// `values[y][x]`; `z_min` is 0.0 by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2d {
    pub values: Vec<Vec<f64>>,
    pub qx: Vec<f64>,
    pub qy: Vec<f64>,
    pub z_min: f64,
    pub z_max: f64,
}

impl Grid2d {
    pub fn new(values: Vec<Vec<f64>>, qx: Vec<f64>, qy: Vec<f64>) -> Self {
        let z_max = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
            .unwrap_or(0.0);

        Self {
            values,
            qx,
            qy,
            z_min: 0.0,
            z_max,
        }
    }
}

/// Parsed content of a result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PlotData {
    OneD(Vec<IqPoint>),
    TwoD(Grid2d),
}

impl PlotData {
    pub fn is_empty(&self) -> bool {
        match self {
            PlotData::OneD(points) => points.is_empty(),
            PlotData::TwoD(grid) => grid.values.iter().all(|row| row.is_empty()),
        }
    }

    pub fn kind(&self) -> PlotKind {
        match self {
            PlotData::OneD(_) => PlotKind::OneD,
            PlotData::TwoD(_) => PlotKind::TwoD,
        }
    }
}

/// Which parser a result file needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    OneD,
    TwoD,
}

impl PlotKind {
    /// Result files are recognised by the suffix Mantid's SaveIq gives them
    pub fn for_filename(filename: &str) -> Option<Self> {
        if filename.ends_with("_Iq.txt") {
            Some(PlotKind::OneD)
        } else if filename.ends_with("_Iqxy.dat") {
            Some(PlotKind::TwoD)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::OneD => "1d",
            PlotKind::TwoD => "2d",
        }
    }
}

/// Cached plot, keyed by (job, filename, owner)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotArtifact {
    pub id: i64,
    /// Local id of the remote job row
    pub remote_job_id: i64,
    pub filename: String,
    pub owner: String,
    pub data: PlotData,
    pub created_at: i64, // epoch ms
}
