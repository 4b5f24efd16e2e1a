// Fermi job submission service adapter (MantidRemote REST API)

use crate::response::{
    err_msg, id_string, json_body, status_error, text_field, transport_error,
};
use async_trait::async_trait;
use eqsans_core::domain::{
    decode_time, Credentials, JobInfo, JobStatus, RemoteJobId, RemoteTransaction, SessionToken,
};
use eqsans_core::error::{AppError, RemoteError, RemoteResult, Result};
use eqsans_core::port::{Authentication, RemoteService, SubmitRequest};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call timeouts. Defaults mirror what the service is known to answer within.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FermiTimeouts {
    pub info: Duration,
    pub authenticate: Duration,
    pub transaction: Duration,
    pub submit: Duration,
    pub query: Duration,
    pub files: Duration,
    pub query_all: Duration,
    pub download: Duration,
}

impl Default for FermiTimeouts {
    fn default() -> Self {
        Self {
            info: Duration::from_millis(500),
            authenticate: Duration::from_millis(500),
            transaction: Duration::from_millis(500),
            submit: Duration::from_secs(5),
            query: Duration::from_millis(1500),
            files: Duration::from_millis(1500),
            query_all: Duration::from_secs(30),
            download: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FermiConfig {
    /// e.g. `https://fermi.ornl.gov/MantidRemote/`
    pub base_url: String,
    pub timeouts: FermiTimeouts,
}

impl FermiConfig {
    pub fn new(scheme: &str, host: &str, base_path: &str) -> Self {
        let path = base_path.trim_matches('/');
        let base_url = if path.is_empty() {
            format!("{}://{}/", scheme, host)
        } else {
            format!("{}://{}/{}/", scheme, host, path)
        };
        Self {
            base_url,
            timeouts: FermiTimeouts::default(),
        }
    }
}

pub struct FermiClient {
    client: Client,
    base_url: String,
    timeouts: FermiTimeouts,
}

impl FermiClient {
    pub fn new(config: FermiConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {}", e)))?;
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            timeouts: config.timeouts,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn get(&self, endpoint: &str, token: &SessionToken, timeout: Duration) -> RequestBuilder {
        self.client
            .get(self.url(endpoint))
            .header(COOKIE, token.as_str())
            .timeout(timeout)
    }

    /// Send and keep only 200 answers
    async fn send(&self, operation: &str, request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await.map_err(|e| {
            let err = transport_error(operation, e);
            warn!(operation, error = %err, "Fermi call failed");
            err
        })?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let err = status_error(operation, status, &body);
        warn!(operation, status = status.as_u16(), error = %err, "Fermi call rejected");
        Err(err)
    }

    async fn send_json(&self, operation: &str, request: RequestBuilder) -> RemoteResult<Value> {
        let response = self.send(operation, request).await?;
        json_body(operation, response).await
    }
}

/// Job record as found under its id in a `query` answer
fn parse_job(job_id: &str, value: &Value) -> RemoteResult<JobInfo> {
    if !value.is_object() {
        return Err(RemoteError::Parse(format!("job {} is not an object", job_id)));
    }
    let date = |field: &str| text_field(value, field).and_then(|s| decode_time(&s));

    Ok(JobInfo {
        job_id: job_id.to_string(),
        status: JobStatus::parse(&text_field(value, "JobStatus").unwrap_or_default()),
        job_name: text_field(value, "JobName").unwrap_or_default(),
        script_name: text_field(value, "ScriptName").unwrap_or_default(),
        trans_id: value.get("TransID").and_then(id_string).unwrap_or_default(),
        submit_date: date("SubmitDate"),
        start_date: date("StartDate"),
        completion_date: date("CompletionDate"),
    })
}

#[async_trait]
impl RemoteService for FermiClient {
    async fn authenticate(&self, credentials: &Credentials) -> RemoteResult<Authentication> {
        let request = self
            .client
            .get(self.url("authenticate"))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .timeout(self.timeouts.authenticate);

        let response = request.send().await.map_err(|e| {
            let err = transport_error("authenticate", e);
            warn!(error = %err, "Fermi authentication unreachable");
            err
        })?;

        let status = response.status();
        // Only the `name=value` part identifies the session
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let body = response.bytes().await.unwrap_or_default();
        let info: Option<Value> = serde_json::from_slice(&body).ok();

        if status != StatusCode::OK {
            let reason = info
                .as_ref()
                .and_then(err_msg)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(username = %credentials.username, reason = %reason, "Fermi rejected credentials");
            return Err(RemoteError::Auth(reason));
        }

        let Some(cookie) = cookie else {
            return Err(RemoteError::Auth(
                "authentication answer carried no session cookie".to_string(),
            ));
        };

        let uid = info
            .as_ref()
            .and_then(|v| text_field(v, "Authenticated_As"))
            .unwrap_or_else(|| credentials.username.clone());

        Ok(Authentication {
            token: SessionToken::new(cookie),
            uid,
        })
    }

    async fn whoami(&self, token: &SessionToken) -> RemoteResult<String> {
        let info = self
            .send_json("info", self.get("info", token, self.timeouts.info))
            .await?;

        if let Some(uid) = text_field(&info, "Authenticated_As") {
            return Ok(uid);
        }
        match err_msg(&info) {
            Some(msg) => Err(RemoteError::Auth(msg)),
            None => Err(RemoteError::Parse(
                "info answer has no Authenticated_As".to_string(),
            )),
        }
    }

    async fn start_transaction(&self, token: &SessionToken) -> RemoteResult<RemoteTransaction> {
        let request = self
            .get("transaction", token, self.timeouts.transaction)
            .query(&[("Action", "Start")]);
        let info = self.send_json("transaction.start", request).await?;

        if let Some(msg) = err_msg(&info) {
            return Err(RemoteError::Rejected(msg));
        }
        let trans_id = info
            .get("TransID")
            .and_then(id_string)
            .ok_or_else(|| RemoteError::Parse("transaction answer has no TransID".to_string()))?;
        let directory = text_field(&info, "Directory")
            .ok_or_else(|| RemoteError::Parse("transaction answer has no Directory".to_string()))?;

        debug!(trans_id = %trans_id, directory = %directory, "Fermi transaction allocated");
        Ok(RemoteTransaction {
            trans_id,
            directory,
        })
    }

    async fn stop_transaction(&self, token: &SessionToken, trans_id: &str) -> RemoteResult<()> {
        let request = self
            .get("transaction", token, self.timeouts.transaction)
            .query(&[("Action", "Stop"), ("TransID", trans_id)]);
        self.send("transaction.stop", request).await?;
        Ok(())
    }

    async fn submit(
        &self,
        token: &SessionToken,
        request: &SubmitRequest,
    ) -> RemoteResult<RemoteJobId> {
        let http = self
            .client
            .post(self.url("submit"))
            .header(COOKIE, token.as_str())
            .timeout(self.timeouts.submit)
            .form(&request.form_fields());
        let answer = self.send_json("submit", http).await?;

        if let Some(msg) = err_msg(&answer) {
            return Err(RemoteError::Rejected(msg));
        }
        answer
            .get("JobID")
            .and_then(id_string)
            .ok_or_else(|| RemoteError::Parse("submit answer has no JobID".to_string()))
    }

    async fn query_job(&self, token: &SessionToken, job_id: &str) -> RemoteResult<JobInfo> {
        let request = self
            .get("query", token, self.timeouts.query)
            .query(&[("JobID", job_id)]);
        let answer = self.send_json("query", request).await?;

        match answer.get(job_id) {
            Some(job) => parse_job(job_id, job),
            None => match err_msg(&answer) {
                Some(msg) => Err(RemoteError::Rejected(msg)),
                None => Err(RemoteError::Parse(format!(
                    "query answer does not mention job {}",
                    job_id
                ))),
            },
        }
    }

    async fn query_jobs(&self, token: &SessionToken) -> RemoteResult<Vec<JobInfo>> {
        let answer = self
            .send_json("query", self.get("query", token, self.timeouts.query_all))
            .await?;

        if let Some(msg) = err_msg(&answer) {
            return Err(RemoteError::Rejected(msg));
        }
        let jobs = answer
            .as_object()
            .ok_or_else(|| RemoteError::Parse("query answer is not an object".to_string()))?;
        jobs.iter()
            .map(|(job_id, job)| parse_job(job_id, job))
            .collect()
    }

    async fn list_files(&self, token: &SessionToken, trans_id: &str) -> RemoteResult<Vec<String>> {
        let request = self
            .get("files", token, self.timeouts.files)
            .query(&[("TransID", trans_id)]);
        let answer = self.send_json("files", request).await?;

        if let Some(msg) = err_msg(&answer) {
            return Err(RemoteError::Rejected(msg));
        }
        let files = answer
            .get("Files")
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::Parse("files answer has no Files list".to_string()))?;
        Ok(files
            .iter()
            .filter_map(|f| f.as_str().map(str::to_string))
            .collect())
    }

    async fn download(
        &self,
        token: &SessionToken,
        trans_id: &str,
        filename: &str,
    ) -> RemoteResult<Vec<u8>> {
        let request = self
            .get("download", token, self.timeouts.download)
            .query(&[("TransID", trans_id), ("File", filename)]);
        let response = self.send("download", request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("download", e))?;
        debug!(trans_id, filename, size = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_normalization() {
        let config = FermiConfig::new("https", "fermi.ornl.gov", "/MantidRemote/");
        assert_eq!(config.base_url, "https://fermi.ornl.gov/MantidRemote/");
        let config = FermiConfig::new("http", "localhost:8080", "");
        assert_eq!(config.base_url, "http://localhost:8080/");
    }

    #[test]
    fn test_parse_job_record() {
        let record = json!({
            "CompletionDate": "2014-02-14T21:25:58+00:00",
            "StartDate": "2014-02-14T21:25:37+00:00",
            "SubmitDate": "2014-02-14T21:25:36+00:00",
            "JobName": "Unknown",
            "ScriptName": "web_submission.py",
            "JobStatus": "COMPLETED",
            "TransID": 136
        });
        let job = parse_job("7665", &record).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.trans_id, "136");
        assert_eq!(job.script_name, "web_submission.py");
        let submit = job.submit_date.unwrap();
        let complete = job.completion_date.unwrap();
        assert_eq!((complete - submit).num_seconds(), 22);
    }

    #[test]
    fn test_parse_job_tolerates_missing_dates() {
        let job = parse_job("1", &json!({"JobStatus": "QUEUED", "TransID": "9"})).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.start_date.is_none());
        assert!(parse_job("1", &json!("nope")).is_err());
    }
}
