// Reduction entries and experiments

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

pub type ReductionId = i64;
pub type ExperimentId = i64;

/// Name of the experiment seeded at migration time for reductions without an IPTS
pub const UNCATEGORIZED: &str = "uncategorized";

/// Experiment (IPTS) grouping reductions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    pub created_at: i64,
}

impl Experiment {
    pub fn is_uncategorized(&self) -> bool {
        self.name == UNCATEGORIZED
    }
}

/// Flat parameter map of a reduction (name -> bool / number / string)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReductionParameters(serde_json::Map<String, serde_json::Value>);

impl ReductionParameters {
    pub fn new(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            serde_json::Value::Null => Ok(Self::default()),
            other => Err(DomainError::ValidationError(format!(
                "reduction parameters must be an object, got {}",
                other
            ))),
        }
    }

    pub fn as_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }

    pub fn set(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.0.insert(name.into(), value);
    }

    /// Non-empty string value
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// Stored reduction entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reduction {
    pub id: ReductionId,
    pub owner: String,
    pub instrument: String,
    pub name: String,
    pub data_file: String,
    pub experiment_id: ExperimentId,
    pub parameters: ReductionParameters,
    pub created_at: i64,
}

impl Reduction {
    pub fn is_owned_by(&self, user: &str) -> bool {
        self.owner == user
    }
}

/// Reduction about to be created
#[derive(Debug, Clone)]
pub struct NewReduction {
    pub owner: String,
    pub instrument: String,
    pub name: String,
    pub data_file: String,
    /// IPTS name; `None` files the reduction under "uncategorized"
    pub experiment: Option<String>,
    pub parameters: ReductionParameters,
}

impl NewReduction {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "reduction name cannot be empty".to_string(),
            ));
        }
        if self.name.len() > 128 {
            return Err(DomainError::ValidationError(format!(
                "reduction name too long ({} > 128)",
                self.name.len()
            )));
        }
        if self.instrument.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "instrument cannot be empty".to_string(),
            ));
        }
        if let Some(expt) = &self.experiment {
            if expt.len() > 24 {
                return Err(DomainError::ValidationError(format!(
                    "experiment name too long: {}",
                    expt
                )));
            }
        }
        Ok(())
    }
}
