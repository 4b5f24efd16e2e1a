//! Reduction workflow: submit, job sets, job details with cached plots,
//! and cleanup on delete.

mod common;

use common::Portal;
use eqsans_core::application::{CreateReduction, FERMI_UNREACHABLE};
use eqsans_core::domain::{PlotData, RequestContext};
use eqsans_core::error::{AppError, RemoteError};
use eqsans_core::port::ReductionStore;
use eqsans_infra_sqlite::{run_migrations, SqliteReductionStore};

const IQ_FILE: &[u8] = b"# I(q) for run 4065\n\
    0.010 120.5 3.1\n\
    0.020 98.25 2.7\n\
    nan-row here\n\
    0.030 77.0 2.2\n";

const IQXY_FILE: &[u8] = b"# Qx Qy I dI\n\
    -0.01 -0.01 1.0 0.1\n\
    0.01 -0.01 2.0 0.1\n\
    -0.01 0.01 3.0 0.1\n\
    0.01 0.01 nan 0.1\n";

/// "uncategorized" exists exactly once, even after repeated migrations
#[tokio::test]
async fn test_uncategorized_seeded_once() {
    let portal = Portal::new().await;
    run_migrations(&portal.pool).await.unwrap();

    let seeded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM experiments WHERE name = 'uncategorized'")
            .fetch_one(&portal.pool)
            .await
            .unwrap();
    assert_eq!(seeded, 1);

    let ctx = portal.login("alice").await;
    let loose = portal
        .reductions
        .create_reduction(
            &ctx,
            CreateReduction {
                instrument: "eqsans".to_string(),
                name: "No IPTS".to_string(),
                data_file: "4066".to_string(),
                experiment: Some("  ".to_string()),
                parameters: serde_json::Value::Null,
            },
        )
        .await
        .unwrap();

    let store = SqliteReductionStore::new(portal.pool.clone());
    let uncategorized = store.uncategorized().await.unwrap();
    assert_eq!(loose.experiment_id, uncategorized.id);
    assert!(uncategorized.is_uncategorized());
    println!("✅ Default experiment seeded once and used for blank IPTS");
}

/// One submit: fresh transaction, script written for its directory,
/// parameters snapshotted on the job
#[tokio::test]
async fn test_submit_records_job() {
    let portal = Portal::new().await;
    let mut ctx = portal.login("alice").await;
    let reduction = portal.reduction(&ctx, "Sample A", "4065").await;

    let job = portal
        .reductions
        .submit_reduction(&mut ctx, reduction.id)
        .await
        .unwrap();

    assert_eq!(job.remote_id, "1001");
    assert_eq!(job.reduction_id, reduction.id);
    assert_eq!(job.parameters["data_file"], "4065");

    let submitted = portal.remote.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].trans_id, "101");
    assert!(submitted[0].script.contains("/fermi/transactions/101"));

    let jobs = portal
        .reductions
        .jobs_for_reduction(&ctx, reduction.id)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, job.id);
    println!("✅ Submit recorded under a new transaction");
}

/// A job set shares one transaction and numbers its scripts
#[tokio::test]
async fn test_job_set_shares_transaction() {
    let portal = Portal::new().await;
    let mut ctx = portal.login("alice").await;
    let ids = vec![
        portal.reduction(&ctx, "Sample A", "4065").await.id,
        portal.reduction(&ctx, "Sample B", "4066").await.id,
        portal.reduction(&ctx, "Sample C", "4067").await.id,
    ];

    let outcome = portal.reductions.submit_job_set(&mut ctx, &ids).await.unwrap();

    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.submitted.len(), 3);
    assert!(outcome
        .submitted
        .iter()
        .all(|job| job.transaction_id == outcome.transaction.id));
    assert_eq!(portal.count("transactions").await, 1);

    let names: Vec<String> = portal
        .remote
        .submitted()
        .iter()
        .map(|req| req.script_name.clone())
        .collect();
    assert_eq!(
        names,
        vec![
            "job_submission_0.py",
            "job_submission_1.py",
            "job_submission_2.py"
        ]
    );

    let active = portal.reductions.list_active_jobs(&ctx).await.unwrap();
    assert_eq!(active.len(), 3);

    // Stopping the transaction takes its jobs off the active list
    portal
        .client
        .stop_transaction(&mut ctx, &outcome.transaction.trans_id)
        .await
        .unwrap();
    assert!(portal.reductions.list_active_jobs(&ctx).await.unwrap().is_empty());
    println!("✅ Job set submitted under one transaction");
}

/// Empty sets and foreign reductions are refused before anything is sent
#[tokio::test]
async fn test_job_set_guards() {
    let portal = Portal::new().await;
    let alice = portal.login("alice").await;
    let mut bob = portal.login("bob").await;
    let theirs = portal.reduction(&alice, "Sample A", "4065").await;

    let err = portal.reductions.submit_job_set(&mut bob, &[]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = portal
        .reductions
        .submit_job_set(&mut bob, &[theirs.id])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = portal
        .reductions
        .submit_reduction(&mut bob, 9_999)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(portal.count("transactions").await, 0);
    assert!(portal.remote.submitted().is_empty());
    println!("✅ Job set guards hold");
}

/// Job details parse result files once and serve the cache afterwards
#[tokio::test]
async fn test_job_details_fetch_plots_once() {
    let portal = Portal::new().await;
    let mut ctx = portal.login("alice").await;
    let reduction = portal.reduction(&ctx, "Sample A", "4065").await;
    let job = portal
        .reductions
        .submit_reduction(&mut ctx, reduction.id)
        .await
        .unwrap();

    portal.remote.add_file("101", "EQSANS_4065_Iq.txt", IQ_FILE);
    portal.remote.add_file("101", "EQSANS_4065_Iqxy.dat", IQXY_FILE);
    portal.remote.add_file("101", "reduction.log", b"done");

    let details = portal
        .reductions
        .job_details(&ctx, &job.remote_id)
        .await
        .unwrap();
    assert!(details.alert.is_none());
    assert_eq!(details.files.len(), 3);
    assert_eq!(details.plots.len(), 2);
    assert_eq!(portal.remote.download_count(), 2);

    match &details.plots[0].data {
        PlotData::OneD(points) => {
            assert_eq!(points.len(), 3);
            assert_eq!(points[1].intensity, 98.25);
        }
        other => panic!("expected I(q), got {:?}", other),
    }
    match &details.plots[1].data {
        PlotData::TwoD(grid) => {
            assert_eq!(grid.qx, vec![-0.01, 0.01]);
            assert_eq!(grid.values, vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
            assert_eq!(grid.z_max, 3.0);
        }
        other => panic!("expected I(qx, qy), got {:?}", other),
    }

    let again = portal
        .reductions
        .job_details(&ctx, &job.remote_id)
        .await
        .unwrap();
    let ids = |plots: &[eqsans_core::domain::PlotArtifact]| {
        plots.iter().map(|p| p.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&again.plots), ids(&details.plots));
    assert_eq!(portal.remote.download_count(), 2);
    assert_eq!(portal.count("plots").await, 2);
    println!("✅ Plots downloaded once, then served from cache");
}

/// Fermi being down yields an alert, not an error
#[tokio::test]
async fn test_job_details_alert_when_unreachable() {
    let portal = Portal::new().await;
    let mut ctx = portal.login("alice").await;
    let reduction = portal.reduction(&ctx, "Sample A", "4065").await;
    let job = portal
        .reductions
        .submit_reduction(&mut ctx, reduction.id)
        .await
        .unwrap();

    portal
        .remote
        .fail_with(RemoteError::Connectivity("connection refused".to_string()));
    let details = portal
        .reductions
        .job_details(&ctx, &job.remote_id)
        .await
        .unwrap();

    assert_eq!(details.alert.as_deref(), Some(FERMI_UNREACHABLE));
    assert!(details.info.is_none());
    assert!(details.plots.is_empty());
    println!("✅ Unreachable Fermi reported as an alert");
}

/// Without a Fermi session, job details report "not authenticated"
#[tokio::test]
async fn test_job_details_without_session_is_auth_error() {
    let portal = Portal::new().await;
    let mut ctx = portal.login("alice").await;
    let reduction = portal.reduction(&ctx, "Sample A", "4065").await;
    let job = portal
        .reductions
        .submit_reduction(&mut ctx, reduction.id)
        .await
        .unwrap();

    let anonymous = RequestContext::new("session-anon", "alice");
    let err = portal
        .reductions
        .job_details(&anonymous, &job.remote_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Remote(RemoteError::Auth(_))));

    // An expired cookie is rejected the same way
    portal
        .remote
        .fail_with(RemoteError::Auth("session expired".to_string()));
    let err = portal
        .reductions
        .job_details(&ctx, &job.remote_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Remote(RemoteError::Auth(_))));
    println!("✅ Missing Fermi session is not reported as unreachable");
}

/// Deleting a reduction removes its jobs and cached plots, not the
/// transaction history
#[tokio::test]
async fn test_delete_cascades_to_jobs_and_plots() {
    let portal = Portal::new().await;
    let mut ctx = portal.login("alice").await;
    let reduction = portal.reduction(&ctx, "Sample A", "4065").await;
    let job = portal
        .reductions
        .submit_reduction(&mut ctx, reduction.id)
        .await
        .unwrap();
    portal.remote.add_file("101", "EQSANS_4065_Iq.txt", IQ_FILE);
    portal
        .reductions
        .job_details(&ctx, &job.remote_id)
        .await
        .unwrap();
    assert_eq!(portal.count("plots").await, 1);

    let bob = portal.login("bob").await;
    let err = portal
        .reductions
        .delete_reduction(&bob, reduction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    portal
        .reductions
        .delete_reduction(&ctx, reduction.id)
        .await
        .unwrap();

    assert_eq!(portal.count("reductions").await, 0);
    assert_eq!(portal.count("remote_jobs").await, 0);
    assert_eq!(portal.count("plots").await, 0);
    assert_eq!(portal.count("transactions").await, 1);
    assert!(portal.reductions.list_reductions(&ctx).await.unwrap().is_empty());
    println!("✅ Delete cascades to jobs and plots");
}
