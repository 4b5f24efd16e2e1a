//! Daemon configuration from environment variables

use anyhow::{bail, Context, Result};
use eqsans_api_rpc::RpcServerConfig;
use eqsans_infra_http::{FermiConfig, IcatConfig};
use std::net::IpAddr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.eqsans/portal.db";
const DEFAULT_FERMI_HOST: &str = "fermi.ornl.gov";
const DEFAULT_FERMI_BASE_URL: &str = "/MantidRemote/";
const DEFAULT_FERMI_SCHEME: &str = "https";
const DEFAULT_ICAT_DOMAIN: &str = "icat.sns.gov";
const DEFAULT_ICAT_PORT: u16 = 2080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Tilde-expanded SQLite file path
    pub db_path: String,
    pub rpc: RpcServerConfig,
    pub fermi: FermiConfig,
    pub icat: IcatConfig,
    pub log_format: LogFormat,
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

impl PortalConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let db_path = shellexpand::tilde(&get("EQSANS_DB_PATH", DEFAULT_DB_PATH)).into_owned();

        let mut rpc = RpcServerConfig::default();
        if let Some(host) = lookup("EQSANS_RPC_HOST") {
            rpc.host = host;
        }
        // Portal users are self-asserted; non-loopback binds need an explicit opt-in
        let allow_remote = lookup("EQSANS_RPC_ALLOW_REMOTE").as_deref() == Some("1");
        if !allow_remote && !is_loopback(&rpc.host) {
            bail!(
                "EQSANS_RPC_HOST {} is not a loopback address; set EQSANS_RPC_ALLOW_REMOTE=1 to bind it",
                rpc.host
            );
        }
        if let Some(port) = lookup("EQSANS_RPC_PORT") {
            rpc.port = port
                .parse()
                .with_context(|| format!("EQSANS_RPC_PORT is not a port: {}", port))?;
        }

        let mut fermi = FermiConfig::new(
            &get("FERMI_SCHEME", DEFAULT_FERMI_SCHEME),
            &get("FERMI_HOST", DEFAULT_FERMI_HOST),
            &get("FERMI_BASE_URL", DEFAULT_FERMI_BASE_URL),
        );
        let timeouts = &mut fermi.timeouts;
        for (call, slot) in [
            ("INFO", &mut timeouts.info),
            ("AUTHENTICATE", &mut timeouts.authenticate),
            ("TRANSACTION", &mut timeouts.transaction),
            ("SUBMIT", &mut timeouts.submit),
            ("QUERY", &mut timeouts.query),
            ("FILES", &mut timeouts.files),
            ("QUERY_ALL", &mut timeouts.query_all),
            ("DOWNLOAD", &mut timeouts.download),
        ] {
            let key = format!("FERMI_TIMEOUT_{}_MS", call);
            if let Some(value) = lookup(&key) {
                let millis: u64 = value
                    .parse()
                    .with_context(|| format!("{} is not a number of milliseconds: {}", key, value))?;
                *slot = Duration::from_millis(millis);
            }
        }

        let icat_port = match lookup("ICAT_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("ICAT_PORT is not a port: {}", port))?,
            None => DEFAULT_ICAT_PORT,
        };
        let icat = IcatConfig::new(&get("ICAT_DOMAIN", DEFAULT_ICAT_DOMAIN), icat_port);

        let log_format = match lookup("EQSANS_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path,
            rpc,
            fermi,
            icat,
            log_format,
        })
    }

    pub fn database_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            self.db_path.clone()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }
}
