// Remote Service Port (Fermi job submission service)

use crate::domain::{Credentials, JobInfo, RemoteJobId, RemoteTransaction, SessionToken};
use crate::error::RemoteResult;
use async_trait::async_trait;

/// Outcome of a successful `authenticate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub token: SessionToken,
    /// Account the service reports (`Authenticated_As`)
    pub uid: String,
}

/// Form body of a `submit` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub trans_id: String,
    pub script_name: String,
    pub script: String,
    pub num_nodes: u32,
    pub cores_per_node: u32,
}

impl SubmitRequest {
    pub fn new(
        trans_id: impl Into<String>,
        script_name: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            trans_id: trans_id.into(),
            script_name: script_name.into(),
            script: script.into(),
            num_nodes: 1,
            cores_per_node: 1,
        }
    }

    /// Form fields in wire order
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("TransID".to_string(), self.trans_id.clone()),
            ("NumNodes".to_string(), self.num_nodes.to_string()),
            ("CoresPerNode".to_string(), self.cores_per_node.to_string()),
            ("ScriptName".to_string(), self.script_name.clone()),
            (self.script_name.clone(), self.script.clone()),
        ]
    }
}

/// HTTP surface of the batch service.
///
/// Every call except `authenticate` carries the session cookie. Implementations
/// never retry and map every failure to a `RemoteError` variant.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> RemoteResult<Authentication>;

    /// `GET info`: the account the cookie belongs to
    async fn whoami(&self, token: &SessionToken) -> RemoteResult<String>;

    async fn start_transaction(&self, token: &SessionToken) -> RemoteResult<RemoteTransaction>;

    async fn stop_transaction(&self, token: &SessionToken, trans_id: &str) -> RemoteResult<()>;

    async fn submit(
        &self,
        token: &SessionToken,
        request: &SubmitRequest,
    ) -> RemoteResult<RemoteJobId>;

    async fn query_job(&self, token: &SessionToken, job_id: &str) -> RemoteResult<JobInfo>;

    /// Every job visible to the session
    async fn query_jobs(&self, token: &SessionToken) -> RemoteResult<Vec<JobInfo>>;

    async fn list_files(&self, token: &SessionToken, trans_id: &str) -> RemoteResult<Vec<String>>;

    async fn download(
        &self,
        token: &SessionToken,
        trans_id: &str,
        filename: &str,
    ) -> RemoteResult<Vec<u8>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobStatus;
    use crate::error::RemoteError;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// Password the mock rejects
    pub const BAD_PASSWORD: &str = "wrong";

    #[derive(Default)]
    struct MockState {
        next_trans: u64,
        next_job: u64,
        failure: Option<RemoteError>,
        cookies_seen: Vec<(String, String)>,
        submitted: Vec<SubmitRequest>,
        stopped: Vec<String>,
        jobs: BTreeMap<String, JobInfo>,
        files: HashMap<String, Vec<(String, Vec<u8>)>>,
        downloads: usize,
    }

    /// Scripted Fermi stand-in.
    ///
    /// Issues sequential TransIDs and JobIDs, records the cookie each call
    /// carried, and fails every call once `fail_with` is set.
    pub struct MockRemoteService {
        state: Mutex<MockState>,
    }

    impl Default for MockRemoteService {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockRemoteService {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(MockState {
                    next_trans: 100,
                    next_job: 1000,
                    ..Default::default()
                }),
            }
        }

        pub fn new_unreachable() -> Self {
            let mock = Self::new();
            mock.fail_with(RemoteError::Connectivity("connection refused".to_string()));
            mock
        }

        pub fn fail_with(&self, error: RemoteError) {
            self.state.lock().unwrap().failure = Some(error);
        }

        pub fn recover(&self) {
            self.state.lock().unwrap().failure = None;
        }

        /// Make `filename` downloadable from `trans_id`
        pub fn add_file(&self, trans_id: &str, filename: &str, content: &[u8]) {
            self.state
                .lock()
                .unwrap()
                .files
                .entry(trans_id.to_string())
                .or_default()
                .push((filename.to_string(), content.to_vec()));
        }

        pub fn set_status(&self, job_id: &str, status: JobStatus) {
            if let Some(job) = self.state.lock().unwrap().jobs.get_mut(job_id) {
                job.status = status;
            }
        }

        /// `(operation, cookie)` for every authenticated call
        pub fn cookies_seen(&self) -> Vec<(String, String)> {
            self.state.lock().unwrap().cookies_seen.clone()
        }

        pub fn submitted(&self) -> Vec<SubmitRequest> {
            self.state.lock().unwrap().submitted.clone()
        }

        pub fn stopped(&self) -> Vec<String> {
            self.state.lock().unwrap().stopped.clone()
        }

        pub fn download_count(&self) -> usize {
            self.state.lock().unwrap().downloads
        }

        fn enter(&self, operation: &str, token: Option<&SessionToken>) -> RemoteResult<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(token) = token {
                state
                    .cookies_seen
                    .push((operation.to_string(), token.as_str().to_string()));
            }
            match &state.failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RemoteService for MockRemoteService {
        async fn authenticate(&self, credentials: &Credentials) -> RemoteResult<Authentication> {
            self.enter("authenticate", None)?;
            if credentials.password == BAD_PASSWORD {
                return Err(RemoteError::Auth("Invalid credentials".to_string()));
            }
            Ok(Authentication {
                token: SessionToken::new(format!("mock_session={}", credentials.username)),
                uid: credentials.username.clone(),
            })
        }

        async fn whoami(&self, token: &SessionToken) -> RemoteResult<String> {
            self.enter("info", Some(token))?;
            token
                .as_str()
                .strip_prefix("mock_session=")
                .map(|uid| uid.to_string())
                .ok_or_else(|| RemoteError::Auth("session expired".to_string()))
        }

        async fn start_transaction(&self, token: &SessionToken) -> RemoteResult<RemoteTransaction> {
            self.enter("transaction.start", Some(token))?;
            let mut state = self.state.lock().unwrap();
            state.next_trans += 1;
            let trans_id = state.next_trans.to_string();
            Ok(RemoteTransaction {
                directory: format!("/fermi/transactions/{}", trans_id),
                trans_id,
            })
        }

        async fn stop_transaction(&self, token: &SessionToken, trans_id: &str) -> RemoteResult<()> {
            self.enter("transaction.stop", Some(token))?;
            self.state
                .lock()
                .unwrap()
                .stopped
                .push(trans_id.to_string());
            Ok(())
        }

        async fn submit(
            &self,
            token: &SessionToken,
            request: &SubmitRequest,
        ) -> RemoteResult<RemoteJobId> {
            self.enter("submit", Some(token))?;
            let mut state = self.state.lock().unwrap();
            state.next_job += 1;
            let job_id = state.next_job.to_string();
            state.jobs.insert(
                job_id.clone(),
                JobInfo {
                    job_id: job_id.clone(),
                    status: JobStatus::Queued,
                    job_name: format!("{}.{}", request.trans_id, job_id),
                    script_name: request.script_name.clone(),
                    trans_id: request.trans_id.clone(),
                    submit_date: None,
                    start_date: None,
                    completion_date: None,
                },
            );
            state.submitted.push(request.clone());
            Ok(job_id)
        }

        async fn query_job(&self, token: &SessionToken, job_id: &str) -> RemoteResult<JobInfo> {
            self.enter("query", Some(token))?;
            self.state
                .lock()
                .unwrap()
                .jobs
                .get(job_id)
                .cloned()
                .ok_or_else(|| RemoteError::Rejected(format!("Unknown job {}", job_id)))
        }

        async fn query_jobs(&self, token: &SessionToken) -> RemoteResult<Vec<JobInfo>> {
            self.enter("query", Some(token))?;
            Ok(self.state.lock().unwrap().jobs.values().cloned().collect())
        }

        async fn list_files(&self, token: &SessionToken, trans_id: &str) -> RemoteResult<Vec<String>> {
            self.enter("files", Some(token))?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .files
                .get(trans_id)
                .map(|files| files.iter().map(|(name, _)| name.clone()).collect())
                .unwrap_or_default())
        }

        async fn download(
            &self,
            token: &SessionToken,
            trans_id: &str,
            filename: &str,
        ) -> RemoteResult<Vec<u8>> {
            self.enter("download", Some(token))?;
            let mut state = self.state.lock().unwrap();
            state.downloads += 1;
            state
                .files
                .get(trans_id)
                .and_then(|files| files.iter().find(|(name, _)| name == filename))
                .map(|(_, content)| content.clone())
                .ok_or_else(|| RemoteError::Connectivity(format!("HTTP 404 for {}", filename)))
        }
    }
}
