// Fermi adapter against an in-process HTTP stand-in

use axum::extract::{Form, Query, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use eqsans_core::domain::{Credentials, JobStatus, SessionToken};
use eqsans_core::error::RemoteError;
use eqsans_core::port::{RemoteService, SubmitRequest};
use eqsans_infra_http::{FermiClient, FermiConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// "alice:secret"
const GOOD_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";
const COOKIE_VALUE: &str = "JSESSIONID=abc123";

#[derive(Clone, Default)]
struct Recorded {
    cookies: Arc<Mutex<Vec<(String, String)>>>,
    forms: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

impl Recorded {
    fn cookie(&self, operation: &str, headers: &HeaderMap) {
        let cookie = headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.cookies
            .lock()
            .unwrap()
            .push((operation.to_string(), cookie));
    }
}

async fn authenticate(headers: HeaderMap) -> impl IntoResponse {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth == GOOD_AUTH {
        (
            StatusCode::OK,
            [(SET_COOKIE, "JSESSIONID=abc123; Path=/MantidRemote; HttpOnly")],
            Json(json!({"Authenticated_As": "alice"})),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Err_Msg": "Bad credentials"})),
        )
            .into_response()
    }
}

async fn info(State(rec): State<Recorded>, headers: HeaderMap) -> impl IntoResponse {
    rec.cookie("info", &headers);
    Json(json!({"Authenticated_As": "alice"}))
}

async fn transaction(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    rec.cookie("transaction", &headers);
    match params.get("Action").map(String::as_str) {
        Some("Start") => Json(json!({"TransID": 136, "Directory": "/fermi/tx/136"})).into_response(),
        Some("Stop") => Json(json!({})).into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(json!({"Err_Msg": "bad action"}))).into_response(),
    }
}

async fn submit(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> impl IntoResponse {
    rec.cookie("submit", &headers);
    let rejected = fields.iter().any(|(k, v)| k == "TransID" && v == "999");
    rec.forms.lock().unwrap().push(fields);
    if rejected {
        Json(json!({"Err_Msg": "Unknown transaction"}))
    } else {
        Json(json!({"JobID": "7665"}))
    }
}

async fn query(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    rec.cookie("query", &headers);
    let job = json!({
        "CompletionDate": "2014-02-14T21:25:58+00:00",
        "StartDate": "2014-02-14T21:25:37+00:00",
        "SubmitDate": "2014-02-14T21:25:36+00:00",
        "JobName": "Unknown",
        "ScriptName": "web_submission.py",
        "JobStatus": "COMPLETED",
        "TransID": 136
    });
    match params.get("JobID").map(String::as_str) {
        Some("slow") => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(json!({})).into_response()
        }
        Some("broken") => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
        Some(id) => {
            let mut answer = serde_json::Map::new();
            answer.insert(id.to_string(), job);
            Json(serde_json::Value::Object(answer)).into_response()
        }
        None => Json(json!({
            "7665": job,
            "7666": {"JobStatus": "RUNNING", "TransID": "137"}
        }))
        .into_response(),
    }
}

async fn files(State(rec): State<Recorded>, headers: HeaderMap) -> impl IntoResponse {
    rec.cookie("files", &headers);
    Json(json!({"Files": ["run_Iq.txt", "run_Iqxy.dat", "reduction.log"]}))
}

async fn download(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    rec.cookie("download", &headers);
    match params.get("File").map(String::as_str) {
        Some("run_Iq.txt") => (StatusCode::OK, "0.01 10.0 0.5\n").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/MantidRemote/authenticate", get(authenticate))
        .route("/MantidRemote/info", get(info))
        .route("/MantidRemote/transaction", get(transaction))
        .route("/MantidRemote/submit", post(submit))
        .route("/MantidRemote/query", get(query))
        .route("/MantidRemote/files", get(files))
        .route("/MantidRemote/download", get(download))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    (addr.to_string(), recorded)
}

fn client_for(host: &str) -> FermiClient {
    let mut config = FermiConfig::new("http", host, "/MantidRemote/");
    config.timeouts.query = Duration::from_millis(100);
    FermiClient::new(config).expect("client")
}

fn token() -> SessionToken {
    SessionToken::new(COOKIE_VALUE)
}

#[tokio::test]
async fn test_authenticate_keeps_cookie_pair() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let auth = client
        .authenticate(&Credentials::new("alice", "secret"))
        .await
        .unwrap();

    assert_eq!(auth.token.as_str(), COOKIE_VALUE);
    assert_eq!(auth.uid, "alice");
}

#[tokio::test]
async fn test_bad_credentials_are_auth_error() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let err = client
        .authenticate(&Credentials::new("alice", "nope"))
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::Auth("Bad credentials".to_string()));
}

#[tokio::test]
async fn test_every_call_forwards_cookie() {
    let (host, recorded) = start_server().await;
    let client = client_for(&host);
    let token = token();

    assert_eq!(client.whoami(&token).await.unwrap(), "alice");
    let tx = client.start_transaction(&token).await.unwrap();
    client.list_files(&token, &tx.trans_id).await.unwrap();
    client.stop_transaction(&token, &tx.trans_id).await.unwrap();

    let cookies = recorded.cookies.lock().unwrap().clone();
    assert_eq!(cookies.len(), 4);
    assert!(cookies.iter().all(|(_, cookie)| cookie == COOKIE_VALUE));
}

#[tokio::test]
async fn test_start_transaction_accepts_numeric_id() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let tx = client.start_transaction(&token()).await.unwrap();

    assert_eq!(tx.trans_id, "136");
    assert_eq!(tx.directory, "/fermi/tx/136");
}

#[tokio::test]
async fn test_submit_posts_script_under_its_name() {
    let (host, recorded) = start_server().await;
    let client = client_for(&host);
    let request = SubmitRequest::new("136", "web_submission.py", "Reduce()\n");

    let job_id = client.submit(&token(), &request).await.unwrap();
    assert_eq!(job_id, "7665");

    let forms = recorded.forms.lock().unwrap().clone();
    let fields: HashMap<_, _> = forms[0].iter().cloned().collect();
    assert_eq!(fields["TransID"], "136");
    assert_eq!(fields["NumNodes"], "1");
    assert_eq!(fields["CoresPerNode"], "1");
    assert_eq!(fields["ScriptName"], "web_submission.py");
    assert_eq!(fields["web_submission.py"], "Reduce()\n");
}

#[tokio::test]
async fn test_submit_error_message_is_rejection() {
    let (host, _) = start_server().await;
    let client = client_for(&host);
    let request = SubmitRequest::new("999", "web_submission.py", "Reduce()\n");

    let err = client.submit(&token(), &request).await.unwrap_err();

    assert_eq!(err, RemoteError::Rejected("Unknown transaction".to_string()));
}

#[tokio::test]
async fn test_query_job_decodes_record() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let job = client.query_job(&token(), "7665").await.unwrap();

    assert_eq!(job.job_id, "7665");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.trans_id, "136");
    assert!(job.completion_date.is_some());
}

#[tokio::test]
async fn test_query_jobs_lists_every_job() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let mut jobs = client.query_jobs(&token()).await.unwrap();
    jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].status, JobStatus::Running);
    assert_eq!(jobs[1].trans_id, "137");
}

#[tokio::test]
async fn test_server_error_is_connectivity() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let err = client.query_job(&token(), "broken").await.unwrap_err();

    assert_eq!(
        err,
        RemoteError::Connectivity("query returned HTTP 500".to_string())
    );
}

#[tokio::test]
async fn test_slow_answer_times_out() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let err = client.query_job(&token(), "slow").await.unwrap_err();

    assert_eq!(err, RemoteError::Connectivity("query timed out".to_string()));
}

#[tokio::test]
async fn test_download_returns_raw_bytes() {
    let (host, _) = start_server().await;
    let client = client_for(&host);

    let bytes = client
        .download(&token(), "136", "run_Iq.txt")
        .await
        .unwrap();
    assert_eq!(bytes, b"0.01 10.0 0.5\n");

    let err = client
        .download(&token(), "136", "missing.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Connectivity(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_connectivity() {
    let client = client_for("127.0.0.1:1");

    let err = client.whoami(&token()).await.unwrap_err();

    assert!(matches!(err, RemoteError::Connectivity(_)));
}
