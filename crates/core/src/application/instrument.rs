// Instrument Registry

use crate::application::script::EqsansScriptBuilder;
use crate::port::ScriptBuilder;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-instrument capabilities exposed to the catalog and submission paths
pub trait InstrumentHooks: Send + Sync {
    fn name(&self) -> &str;

    fn reduction_url(&self) -> String;

    fn remote_jobs_url(&self) -> String;

    /// Link that pre-fills a new reduction for `run` of experiment `ipts`
    fn new_reduction_url(&self, run: &str, ipts: &str) -> String;

    fn script_builder(&self) -> Arc<dyn ScriptBuilder>;
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub struct EqsansHooks {
    builder: Arc<dyn ScriptBuilder>,
}

impl Default for EqsansHooks {
    fn default() -> Self {
        Self {
            builder: Arc::new(EqsansScriptBuilder),
        }
    }
}

impl InstrumentHooks for EqsansHooks {
    fn name(&self) -> &str {
        "eqsans"
    }

    fn reduction_url(&self) -> String {
        "/eqsans/".to_string()
    }

    fn remote_jobs_url(&self) -> String {
        "/eqsans/reduction/jobs/".to_string()
    }

    fn new_reduction_url(&self, run: &str, ipts: &str) -> String {
        format!(
            "/eqsans/reduction/?reduction_name={}&expt_name={}&data_file={}",
            query_value(&format!("Reduction for {}", run)),
            query_value(ipts),
            query_value(run)
        )
    }

    fn script_builder(&self) -> Arc<dyn ScriptBuilder> {
        self.builder.clone()
    }
}

/// Instrument name -> hooks, filled once at startup
#[derive(Default)]
pub struct InstrumentRegistry {
    hooks: HashMap<String, Arc<dyn InstrumentHooks>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every instrument this portal supports
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EqsansHooks::default()));
        registry
    }

    pub fn register(&mut self, hooks: Arc<dyn InstrumentHooks>) {
        self.hooks.insert(hooks.name().to_lowercase(), hooks);
    }

    /// Case-insensitive lookup
    pub fn get(&self, instrument: &str) -> Option<Arc<dyn InstrumentHooks>> {
        self.hooks.get(&instrument.to_lowercase()).cloned()
    }

    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<_> = self.hooks.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = InstrumentRegistry::with_defaults();
        assert!(registry.get("EQSANS").is_some());
        assert!(registry.get("eqsans").is_some());
        assert!(registry.get("EqSans").is_some());
        assert!(registry.get("HYSA").is_none());
        assert_eq!(registry.instruments(), vec!["eqsans".to_string()]);
    }

    #[test]
    fn test_eqsans_urls() {
        let hooks = InstrumentRegistry::with_defaults().get("EQSANS").unwrap();
        assert_eq!(hooks.reduction_url(), "/eqsans/");
        assert_eq!(
            hooks.new_reduction_url("4065", "IPTS-7342"),
            "/eqsans/reduction/?reduction_name=Reduction%20for%204065&expt_name=IPTS-7342&data_file=4065"
        );
        assert_eq!(
            hooks.new_reduction_url("40 65&x=1", "IPTS/7342"),
            "/eqsans/reduction/?reduction_name=Reduction%20for%2040%2065%26x%3D1\
             &expt_name=IPTS%2F7342&data_file=40%2065%26x%3D1"
        );
        assert_eq!(hooks.script_builder().script_name(None), "web_submission.py");
    }
}
