//! EQSANS CLI - Command-line interface for the reduction portal daemon

mod rpc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rpc::RpcClient;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9528";

#[derive(Parser)]
#[command(name = "eqsans")]
#[command(about = "EQSANS remote reduction CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "EQSANS_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Portal session (from `eqsans open`)
    #[arg(long, env = "EQSANS_SESSION")]
    session: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a portal session and print its id
    Open {
        #[arg(short, long, env = "USER")]
        user: String,
    },

    /// Authenticate the session against Fermi
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "EQSANS_FERMI_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show Fermi authentication status
    Status,

    /// Manage remote transactions
    #[command(subcommand)]
    Transaction(TransactionCommands),

    /// List remote jobs visible to the session
    Jobs,

    /// Show status, files and plots of a remote job
    Job { job_id: String },

    /// List output files of a transaction
    Files { trans_id: String },

    /// Download an output file
    Download {
        trans_id: String,
        file: String,

        /// Destination (default: the file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage reductions
    #[command(subcommand)]
    Reduction(ReductionCommands),

    /// Browse the experiment catalog
    #[command(subcommand)]
    Catalog(CatalogCommands),
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Start (or reuse) a transaction
    Start {
        /// Always allocate a new one
        #[arg(long)]
        new: bool,
    },
    /// Stop a transaction
    Stop { trans_id: String },
    /// List the caller's transactions
    List,
}

#[derive(Subcommand)]
enum ReductionCommands {
    /// Create a reduction
    Create {
        #[arg(short, long, default_value = "eqsans")]
        instrument: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        data_file: String,

        #[arg(short, long)]
        experiment: Option<String>,

        /// Reduction parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// List the caller's reductions
    List,
    /// Delete a reduction with its jobs and plots
    Delete { reduction_id: i64 },
    /// Print the reduction script
    Script { reduction_id: i64 },
    /// Submit one reduction, or several under one transaction
    Submit {
        #[arg(required = true)]
        reduction_ids: Vec<i64>,
    },
    /// Jobs of one reduction, or every active job
    Jobs { reduction_id: Option<i64> },
}

#[derive(Subcommand)]
enum CatalogCommands {
    Instruments,
    Experiments {
        instrument: String,
    },
    Experiment {
        instrument: String,
        ipts: String,

        /// Skip the run list
        #[arg(long)]
        no_runs: bool,
    },
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    job_id: String,
    status: String,
    trans_id: String,
    script_name: String,
    #[tabled(display_with = "display_opt")]
    submit_date: Option<String>,
}

#[derive(Deserialize, Tabled)]
struct TransactionRow {
    trans_id: String,
    directory: String,
    is_active: bool,
}

#[derive(Deserialize, Tabled)]
struct ReductionRow {
    id: i64,
    instrument: String,
    name: String,
    data_file: String,
}

#[derive(Deserialize, Tabled)]
struct RemoteJobRow {
    remote_id: String,
    reduction_id: i64,
    transaction_id: i64,
}

#[derive(Deserialize, Tabled)]
struct RunRow {
    id: String,
    #[tabled(display_with = "display_opt")]
    title: Option<String>,
    #[tabled(display_with = "display_num")]
    duration: Option<f64>,
    #[tabled(display_with = "display_num")]
    total_counts: Option<f64>,
}

fn display_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn display_num(value: &Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

fn session(cli: &Cli) -> Result<&str> {
    cli.session
        .as_deref()
        .context("No session: run `eqsans open` and set EQSANS_SESSION (or pass --session)")
}

fn print_table<T: Tabled>(rows: Vec<T>, empty: &str) {
    if rows.is_empty() {
        println!("{}", empty.yellow());
    } else {
        println!("{}", Table::new(rows));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let rpc = RpcClient::new(&cli.rpc_url);

    match &cli.command {
        Commands::Open { user } => {
            let mut params = json!({ "user": user });
            if let Some(session_id) = &cli.session {
                params["session_id"] = json!(session_id);
            }
            let result = rpc.call("session.open.v1", params).await?;
            println!("{}", "✓ Session open".green().bold());
            println!("export EQSANS_SESSION={}", result["session_id"].as_str().unwrap_or_default());
        }

        Commands::Login { username, password } => {
            let params = json!({
                "session_id": session(&cli)?,
                "username": username,
                "password": password,
            });
            let result = rpc.call("remote.authenticate.v1", params).await?;
            println!(
                "{}",
                format!("✓ Authenticated as {}", result["fermi_uid"].as_str().unwrap_or(username.as_str()))
                    .green()
                    .bold()
            );
        }

        Commands::Status => {
            let params = json!({ "session_id": session(&cli)? });
            let status = rpc.call("remote.status.v1", params).await?;
            println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
            match status["uid"].as_str() {
                Some(uid) => println!("  {} {}", "Fermi:".bold(), format!("authenticated as {}", uid).green()),
                None => println!("  {} {}", "Fermi:".bold(), "not authenticated".yellow()),
            }
        }

        Commands::Transaction(command) => {
            let session_id = session(&cli)?;
            match command {
                TransactionCommands::Start { new } => {
                    let params = json!({ "session_id": session_id, "new": new });
                    let tx: TransactionRow = rpc.call_as("remote.transaction.start.v1", params).await?;
                    println!("{}", format!("✓ Transaction {}", tx.trans_id).green().bold());
                    println!("{}", Table::new(vec![tx]));
                }
                TransactionCommands::Stop { trans_id } => {
                    let params = json!({ "session_id": session_id, "trans_id": trans_id });
                    let outcome = rpc.call("remote.transaction.stop.v1", params).await?;
                    println!("  {} {}", "Local:".bold(), outcome["local"].as_str().unwrap_or("?"));
                    if outcome["remote_stopped"].as_bool().unwrap_or(false) {
                        println!("  {} stopped", "Fermi:".bold());
                    } else {
                        println!("  {} {}", "Fermi:".bold(), "stop failed (see daemon log)".yellow());
                    }
                }
                TransactionCommands::List => {
                    let params = json!({ "session_id": session_id });
                    let rows: Vec<TransactionRow> = rpc.call_as("remote.transactions.v1", params).await?;
                    print_table(rows, "No transactions");
                }
            }
        }

        Commands::Jobs => {
            let params = json!({ "session_id": session(&cli)? });
            let rows: Vec<JobRow> = rpc.call_as("remote.jobs.v1", params).await?;
            print_table(rows, "No remote jobs");
        }

        Commands::Job { job_id } => {
            let params = json!({ "session_id": session(&cli)?, "job_id": job_id });
            let details = rpc.call("remote.job.v1", params).await?;
            if let Some(alert) = details["alert"].as_str() {
                println!("{}", alert.red().bold());
                return Ok(());
            }
            let info = &details["info"];
            println!("{}", format!("Job {}", job_id).cyan().bold());
            println!("  {} {}", "Status:".bold(), info["status"].as_str().unwrap_or("?"));
            println!("  {} {}", "Transaction:".bold(), info["trans_id"].as_str().unwrap_or("?"));
            println!("  {} {}", "Submitted:".bold(), info["submit_date"].as_str().unwrap_or("-"));
            println!("  {} {}", "Completed:".bold(), info["completion_date"].as_str().unwrap_or("-"));
            for file in details["files"].as_array().into_iter().flatten() {
                println!("  • {}", file.as_str().unwrap_or_default());
            }
            for plot in details["plots"].as_array().into_iter().flatten() {
                println!(
                    "  {} {} ({})",
                    "plot".green(),
                    plot["filename"].as_str().unwrap_or_default(),
                    plot["data"]["kind"].as_str().unwrap_or_default()
                );
            }
        }

        Commands::Files { trans_id } => {
            let params = json!({ "session_id": session(&cli)?, "trans_id": trans_id });
            let files: Vec<String> = rpc.call_as("remote.files.v1", params).await?;
            for file in files {
                println!("{}", file);
            }
        }

        Commands::Download {
            trans_id,
            file,
            output,
        } => {
            let params = json!({ "session_id": session(&cli)?, "trans_id": trans_id, "file": file });
            let result = rpc.call("remote.download.v1", params).await?;
            let content = STANDARD
                .decode(result["content"].as_str().unwrap_or_default())
                .context("Invalid download payload")?;
            let path = output.clone().unwrap_or_else(|| PathBuf::from(file));
            std::fs::write(&path, &content)
                .with_context(|| format!("Cannot write {}", path.display()))?;
            println!(
                "{}",
                format!("✓ {} bytes written to {}", content.len(), path.display()).green()
            );
        }

        Commands::Reduction(command) => reduction(&rpc, session(&cli)?, command).await?,

        Commands::Catalog(command) => catalog(&rpc, command).await?,
    }

    Ok(())
}

async fn reduction(rpc: &RpcClient, session_id: &str, command: &ReductionCommands) -> Result<()> {
    match command {
        ReductionCommands::Create {
            instrument,
            name,
            data_file,
            experiment,
            params,
        } => {
            let parameters: Value = match params {
                Some(raw) => serde_json::from_str(raw).context("Invalid JSON parameters")?,
                None => json!({}),
            };
            let request = json!({
                "session_id": session_id,
                "instrument": instrument,
                "name": name,
                "data_file": data_file,
                "experiment": experiment,
                "parameters": parameters,
            });
            let row: ReductionRow = rpc.call_as("reduction.create.v1", request).await?;
            println!("{}", "✓ Reduction created".green().bold());
            println!("{}", Table::new(vec![row]));
        }
        ReductionCommands::List => {
            let rows: Vec<ReductionRow> = rpc
                .call_as("reduction.list.v1", json!({ "session_id": session_id }))
                .await?;
            print_table(rows, "No reductions");
        }
        ReductionCommands::Delete { reduction_id } => {
            let params = json!({ "session_id": session_id, "reduction_id": reduction_id });
            rpc.call("reduction.delete.v1", params).await?;
            println!("{}", format!("✓ Reduction {} deleted", reduction_id).green().bold());
        }
        ReductionCommands::Script { reduction_id } => {
            let params = json!({ "session_id": session_id, "reduction_id": reduction_id });
            let result = rpc.call("reduction.script.v1", params).await?;
            print!("{}", result["script"].as_str().unwrap_or_default());
        }
        ReductionCommands::Submit { reduction_ids } => {
            if let [reduction_id] = reduction_ids.as_slice() {
                let params = json!({ "session_id": session_id, "reduction_id": reduction_id });
                let job: RemoteJobRow = rpc.call_as("reduction.submit.v1", params).await?;
                println!("{}", format!("✓ Submitted job {}", job.remote_id).green().bold());
            } else {
                let params = json!({ "session_id": session_id, "reduction_ids": reduction_ids });
                let outcome = rpc.call("reduction.submit_set.v1", params).await?;
                println!(
                    "{}",
                    format!(
                        "✓ Transaction {}",
                        outcome["transaction"]["trans_id"].as_str().unwrap_or("?")
                    )
                    .green()
                    .bold()
                );
                let jobs: Vec<RemoteJobRow> = serde_json::from_value(outcome["submitted"].clone())?;
                print_table(jobs, "No job submitted");
                for failure in outcome["failed"].as_array().into_iter().flatten() {
                    println!("  {} reduction {}: {}", "✗".red(), failure[0], failure[1]);
                }
            }
        }
        ReductionCommands::Jobs { reduction_id } => {
            let params = json!({ "session_id": session_id, "reduction_id": reduction_id });
            let rows: Vec<RemoteJobRow> = rpc.call_as("reduction.jobs.v1", params).await?;
            print_table(rows, "No jobs");
        }
    }
    Ok(())
}

async fn catalog(rpc: &RpcClient, command: &CatalogCommands) -> Result<()> {
    match command {
        CatalogCommands::Instruments => {
            let instruments = rpc.call("catalog.instruments.v1", Value::Null).await?;
            for entry in instruments.as_array().into_iter().flatten() {
                let name = entry["name"].as_str().unwrap_or_default();
                if entry["reduction_url"].is_string() {
                    println!("{} {}", name.bold(), "(reduction available)".green());
                } else {
                    println!("{}", name);
                }
            }
        }
        CatalogCommands::Experiments { instrument } => {
            let experiments: Vec<String> = rpc
                .call_as("catalog.experiments.v1", json!({ "instrument": instrument }))
                .await?;
            for ipts in experiments {
                println!("{}", ipts);
            }
        }
        CatalogCommands::Experiment {
            instrument,
            ipts,
            no_runs,
        } => {
            let params = json!({ "instrument": instrument, "ipts": ipts, "include_runs": !no_runs });
            let experiment = rpc.call("catalog.experiment.v1", params).await?;
            let meta = &experiment["metadata"];
            println!("{}", ipts.cyan().bold());
            println!("  {} {}", "Title:".bold(), meta["title"].as_str().unwrap_or("-"));
            println!("  {} {}", "Created:".bold(), meta["create_time"].as_str().unwrap_or("-"));
            println!("  {} {}", "Runs:".bold(), meta["run_range"].as_str().unwrap_or("-"));
            if !no_runs {
                let runs: Vec<RunRow> = serde_json::from_value(experiment["runs"].clone())?;
                print_table(runs, "No runs");
            }
        }
    }
    Ok(())
}
