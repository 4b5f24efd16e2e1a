// ICAT experiment catalog adapter (read-only REST/XML)

use crate::response::{status_error, transport_error};
use async_trait::async_trait;
use eqsans_core::domain::{decode_time, ExperimentMetadata, RunInfo};
use eqsans_core::error::{AppError, RemoteError, RemoteResult, Result};
use eqsans_core::port::CatalogService;
use reqwest::{Client, StatusCode};
use roxmltree::{Document, Node};
use std::time::Duration;
use tracing::warn;

const CATALOG_PATH: &str = "icat-rest-ws/experiment/SNS/";

#[derive(Debug, Clone)]
pub struct IcatConfig {
    /// e.g. `http://icat.sns.gov:2080`
    pub base_url: String,
    pub list_timeout: Duration,
    pub runs_timeout: Duration,
}

impl IcatConfig {
    pub fn new(domain: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{}:{}", domain, port),
            list_timeout: Duration::from_millis(500),
            runs_timeout: Duration::from_millis(1500),
        }
    }
}

pub struct IcatClient {
    client: Client,
    root: String,
    list_timeout: Duration,
    runs_timeout: Duration,
}

impl IcatClient {
    pub fn new(config: IcatConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            root: format!("{}/{}", config.base_url.trim_end_matches('/'), CATALOG_PATH),
            list_timeout: config.list_timeout,
            runs_timeout: config.runs_timeout,
        })
    }

    async fn fetch(&self, operation: &str, path: &str, timeout: Duration) -> RemoteResult<String> {
        let url = format!("{}{}", self.root, path);
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, e))?;
        if status != StatusCode::OK {
            return Err(status_error(operation, status, &body));
        }
        String::from_utf8(body.to_vec())
            .map_err(|_| RemoteError::Parse(format!("{} answer is not UTF-8", operation)))
    }
}

fn experiment_path(instrument: &str, ipts: &str) -> String {
    format!("{}/{}/", instrument.to_uppercase(), ipts.to_uppercase())
}

#[async_trait]
impl CatalogService for IcatClient {
    async fn instruments(&self) -> RemoteResult<Vec<String>> {
        let xml = self
            .fetch("catalog.instruments", "", self.list_timeout)
            .await
            .inspect_err(|e| warn!(error = %e, "Could not list instruments from ICAT"))?;
        parse_instruments(&xml)
    }

    async fn experiments(&self, instrument: &str) -> RemoteResult<Vec<String>> {
        let path = format!("{}/", instrument.to_uppercase());
        let xml = self
            .fetch("catalog.experiments", &path, self.list_timeout)
            .await
            .inspect_err(|e| warn!(instrument, error = %e, "Could not list experiments from ICAT"))?;
        parse_experiments(&xml)
    }

    async fn experiment_metadata(
        &self,
        instrument: &str,
        ipts: &str,
    ) -> RemoteResult<ExperimentMetadata> {
        let base = experiment_path(instrument, ipts);
        let xml = self
            .fetch("catalog.meta", &format!("{}meta", base), self.list_timeout)
            .await
            .inspect_err(|e| warn!(instrument, ipts, error = %e, "ICAT metadata unavailable"))?;
        let mut metadata = parse_metadata(&xml)?;

        // The run range is optional
        metadata.run_range = match self.fetch("catalog.runs", &base, self.list_timeout).await {
            Ok(xml) => parse_run_range(&xml).unwrap_or_else(|e| {
                warn!(instrument, ipts, error = %e, "Malformed ICAT run range");
                None
            }),
            Err(e) => {
                warn!(instrument, ipts, error = %e, "ICAT run range unavailable");
                None
            }
        };
        Ok(metadata)
    }

    async fn runs(&self, instrument: &str, ipts: &str) -> RemoteResult<Vec<RunInfo>> {
        let path = format!("{}all/", experiment_path(instrument, ipts));
        let xml = self
            .fetch("catalog.runs", &path, self.runs_timeout)
            .await
            .inspect_err(|e| warn!(instrument, ipts, error = %e, "ICAT run list unavailable"))?;
        parse_runs(&xml)
    }
}

fn document(xml: &str) -> RemoteResult<Document<'_>> {
    Document::parse(xml).map_err(|e| RemoteError::Parse(format!("invalid catalog XML: {}", e)))
}

/// Concatenated direct text children, `None` when empty
fn text_of(node: Node) -> Option<String> {
    let text: String = node
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn texts_of(doc: &Document, tag: &str) -> Vec<String> {
    doc.descendants()
        .filter(|n| n.has_tag_name(tag))
        .filter_map(text_of)
        .collect()
}

fn child<'a, 'i>(node: Node<'a, 'i>, tag: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(tag))
}

/// `*A` entries are aliases of the base instrument
pub fn parse_instruments(xml: &str) -> RemoteResult<Vec<String>> {
    let doc = document(xml)?;
    Ok(texts_of(&doc, "instrument")
        .into_iter()
        .filter(|name| !name.to_uppercase().ends_with('A'))
        .collect())
}

pub fn parse_experiments(xml: &str) -> RemoteResult<Vec<String>> {
    let doc = document(xml)?;
    Ok(texts_of(&doc, "proposal"))
}

pub fn parse_metadata(xml: &str) -> RemoteResult<ExperimentMetadata> {
    let doc = document(xml)?;
    let Some(meta) = doc.descendants().find(|n| n.has_tag_name("metadata")) else {
        return Ok(ExperimentMetadata::default());
    };

    Ok(ExperimentMetadata {
        title: child(meta, "title").and_then(text_of),
        proposal: child(meta, "proposal").and_then(text_of),
        create_time: child(meta, "createTime")
            .and_then(text_of)
            .and_then(|t| decode_time(&t)),
        run_range: None,
    })
}

pub fn parse_run_range(xml: &str) -> RemoteResult<Option<String>> {
    let doc = document(xml)?;
    Ok(doc
        .descendants()
        .find(|n| n.has_tag_name("runs"))
        .and_then(|runs| child(runs, "runRange"))
        .and_then(text_of))
}

pub fn parse_runs(xml: &str) -> RemoteResult<Vec<RunInfo>> {
    let doc = document(xml)?;
    let number = |run: Node, tag: &str| {
        child(run, tag)
            .and_then(text_of)
            .and_then(|t| t.parse::<f64>().ok())
    };
    let time = |run: Node, tag: &str| {
        child(run, tag)
            .and_then(text_of)
            .and_then(|t| decode_time(&t))
    };

    doc.descendants()
        .filter(|n| n.has_tag_name("run"))
        .map(|run| {
            let id = run
                .attribute("id")
                .ok_or_else(|| RemoteError::Parse("run element without id".to_string()))?;
            Ok(RunInfo {
                id: id.to_string(),
                title: child(run, "title").and_then(text_of),
                start_time: time(run, "startTime"),
                end_time: time(run, "endTime"),
                duration: number(run, "duration"),
                proton_charge: number(run, "protonCharge"),
                total_counts: number(run, "totalCounts"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruments_skip_aliases() {
        let xml = r#"<instruments>
            <instrument>EQSANS</instrument>
            <instrument>HYSA</instrument>
            <instrument>cncs</instrument>
            <instrument>ARCS</instrument>
        </instruments>"#;
        assert_eq!(
            parse_instruments(xml).unwrap(),
            vec!["EQSANS".to_string(), "cncs".to_string(), "ARCS".to_string()]
        );
    }

    #[test]
    fn test_experiments() {
        let xml = "<proposals><proposal>IPTS-7342</proposal><proposal>IPTS-9001</proposal></proposals>";
        assert_eq!(parse_experiments(xml).unwrap(), vec!["IPTS-7342", "IPTS-9001"]);
    }

    #[test]
    fn test_metadata() {
        let xml = r#"<metadata>
            <title>Polymer blends</title>
            <proposal>IPTS-7342</proposal>
            <createTime>2013-04-05T16:17:56.246-04:00</createTime>
        </metadata>"#;
        let meta = parse_metadata(xml).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Polymer blends"));
        assert_eq!(meta.proposal.as_deref(), Some("IPTS-7342"));
        assert!(meta.create_time.is_some());
        assert!(meta.run_range.is_none());

        let empty = parse_metadata("<other/>").unwrap();
        assert_eq!(empty, ExperimentMetadata::default());
    }

    #[test]
    fn test_run_range() {
        let xml = "<runs><runRange>12800-12850</runRange></runs>";
        assert_eq!(parse_run_range(xml).unwrap().as_deref(), Some("12800-12850"));
        assert_eq!(parse_run_range("<runs/>").unwrap(), None);
    }

    #[test]
    fn test_runs() {
        let xml = r#"<runs>
            <run id="12801">
                <title>Blank scanRT</title>
                <startTime>2013-04-05T16:17:56.246-04:00</startTime>
                <endTime>2013-04-05T16:40:12.938-04:00</endTime>
                <duration>1336.6914</duration>
                <protonCharge>1.20244649808e+12</protonCharge>
                <totalCounts>1.3197872E7</totalCounts>
            </run>
            <run id="12802"><title>Empty</title></run>
        </runs>"#;
        let runs = parse_runs(xml).unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, "12801");
        assert_eq!(runs[0].total_counts, Some(1.3197872e7));
        assert!(runs[0].end_time.unwrap() > runs[0].start_time.unwrap());
        assert_eq!(runs[1].duration, None);
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        assert!(matches!(
            parse_instruments("<instruments>"),
            Err(RemoteError::Parse(_))
        ));
    }
}
