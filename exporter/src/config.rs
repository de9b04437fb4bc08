//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or as a `BTCD_EXPORTER_*` variable.
//! The parsed [`Args`] are resolved once into the collector's
//! `ExporterConfig` plus the HTTP server's [`ServerConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::ArgAction;
use clap::Parser;
use clap::builder::{BoolishValueParser, NonEmptyStringValueParser};

use btcd_collector::config::CERT_PATH_VAR;
use btcd_collector::{CollectorConfig, ConfigError, ExporterConfig, RpcConfig, TlsConfig};

#[derive(Parser)]
#[command(
    name = "btcd-exporter",
    about = "Prometheus exporter for a btcd node",
    version
)]
pub struct Args {
    /// `host:port` of the btcd RPC server.
    #[arg(long, env = "BTCD_EXPORTER_HOST", value_parser = NonEmptyStringValueParser::new())]
    pub host: String,

    /// RPC user.
    #[arg(long, env = "BTCD_EXPORTER_USERNAME", value_parser = NonEmptyStringValueParser::new())]
    pub username: String,

    /// RPC password.
    #[arg(
        long,
        env = "BTCD_EXPORTER_PASSWORD",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub password: String,

    /// PEM certificate of the node. Defaults to `<btcd data dir>/rpc.cert`.
    #[arg(long, env = CERT_PATH_VAR)]
    pub cert_path: Option<PathBuf>,

    /// Talk plain HTTP to the node (btcd `--notls`).
    #[arg(long, env = "BTCD_EXPORTER_DISABLE_TLS", value_parser = BoolishValueParser::new())]
    pub disable_tls: bool,

    /// Per-call upstream timeout in seconds. Unset keeps the transport default.
    #[arg(
        long,
        env = "BTCD_EXPORTER_RPC_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rpc_timeout_secs: Option<u64>,

    /// Query the best block header and export `btcd_latest_block_timestamp`.
    #[arg(
        long,
        env = "BTCD_EXPORTER_BEST_BLOCK",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub best_block: bool,

    /// Listen address of the HTTP server.
    #[arg(long, env = "BTCD_EXPORTER_LISTEN_ADDR", default_value = "0.0.0.0:9101")]
    pub listen_addr: SocketAddr,
}

/// Configuration for the exporter HTTP server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Args {
    /// Resolves the parsed options into typed configuration.
    ///
    /// `lookup` supplies the platform variables (`HOME`, `LOCALAPPDATA`)
    /// used to locate the default certificate.
    pub fn resolve<F>(self, lookup: &F) -> Result<(ExporterConfig, ServerConfig), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tls = TlsConfig::resolve(self.disable_tls, self.cert_path, lookup)?;

        let exporter = ExporterConfig {
            rpc: RpcConfig {
                host: self.host,
                username: self.username,
                password: self.password,
                tls,
                timeout: self.rpc_timeout_secs.map(Duration::from_secs),
            },
            collector: CollectorConfig {
                fetch_best_block: self.best_block,
            },
        };
        let server = ServerConfig {
            listen_addr: self.listen_addr,
        };
        Ok((exporter, server))
    }
}
