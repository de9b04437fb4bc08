//! Typed configuration for the collector.
//!
//! This module aggregates configuration for:
//!
//! - the upstream RPC session (`RpcConfig`: host, credentials, TLS, timeout),
//! - the collection cycle itself (`CollectorConfig`).
//!
//! Command-line and environment parsing happens in the binary; this module
//! only holds the resolved values plus the btcd data-directory rules used
//! for the default certificate path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CERT_PATH_VAR: &str = "BTCD_EXPORTER_CERT_PATH";

/// File name of the RPC certificate inside the btcd data directory.
const CERT_FILE_NAME: &str = "rpc.cert";

/// Errors raised while resolving configuration. All of them are fatal.
#[derive(Debug)]
pub enum ConfigError {
    /// The TLS certificate could not be read.
    CertUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No home directory to derive the default certificate path from.
    NoHomeDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::CertUnreadable { path, source } => {
                write!(f, "error reading cert file {}: {source}", path.display())
            }
            ConfigError::NoHomeDir => write!(
                f,
                "cannot determine home directory for the default cert path; set {CERT_PATH_VAR}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::CertUnreadable { source, .. } => Some(source),
            ConfigError::NoHomeDir => None,
        }
    }
}

/// How the RPC session is secured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TlsConfig {
    /// Plain HTTP.
    Disabled,
    /// HTTPS, trusting only the certificate at `path`.
    Certificate {
        path: PathBuf,
        /// `true` if `path` was derived from the btcd data directory
        /// because no explicit path was configured.
        defaulted: bool,
    },
}

impl TlsConfig {
    /// Picks the TLS mode from the raw options.
    ///
    /// An explicit `cert_path` wins; otherwise the certificate is looked up
    /// in the btcd data directory, resolved through `lookup`.
    pub fn resolve<F>(
        disable_tls: bool,
        cert_path: Option<PathBuf>,
        lookup: &F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if disable_tls {
            return Ok(TlsConfig::Disabled);
        }
        match cert_path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Ok(TlsConfig::Certificate {
                path,
                defaulted: false,
            }),
            None => Ok(TlsConfig::Certificate {
                path: default_cert_path(lookup)?,
                defaulted: true,
            }),
        }
    }
}

/// Connection settings for the upstream btcd node.
#[derive(Clone)]
pub struct RpcConfig {
    /// `host:port` of the node's RPC listener.
    pub host: String,
    pub username: String,
    pub password: String,
    pub tls: TlsConfig,
    /// Per-call timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

impl RpcConfig {
    /// Reads the PEM certificate referenced by [`TlsConfig::Certificate`].
    ///
    /// Returns `Ok(None)` when TLS is disabled.
    pub fn read_certificate(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        match &self.tls {
            TlsConfig::Disabled => Ok(None),
            TlsConfig::Certificate { path, .. } => std::fs::read(path)
                .map(Some)
                .map_err(|source| ConfigError::CertUnreadable {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Options for a single collection cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Whether to query the best block header and export
    /// `latest_block_timestamp`.
    pub fetch_best_block: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_best_block: true,
        }
    }
}

/// Top-level configuration for the collector side of the exporter.
#[derive(Clone, Debug)]
pub struct ExporterConfig {
    pub rpc: RpcConfig,
    pub collector: CollectorConfig,
}

/// Returns `<btcd data dir>/rpc.cert` for the current platform.
///
/// The data directory matches what btcd itself uses: `~/.btcd` on Unix,
/// `~/Library/Application Support/Btcd` on macOS and `%LOCALAPPDATA%\Btcd`
/// on Windows.
pub fn default_cert_path<F>(lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(app_data_dir(lookup)?.join(CERT_FILE_NAME))
}

fn app_data_dir<F>(lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if cfg!(windows) {
        let base = lookup("LOCALAPPDATA")
            .or_else(|| lookup("APPDATA"))
            .ok_or(ConfigError::NoHomeDir)?;
        return Ok(Path::new(&base).join("Btcd"));
    }

    let home = lookup("HOME").ok_or(ConfigError::NoHomeDir)?;
    if cfg!(target_os = "macos") {
        Ok(Path::new(&home)
            .join("Library")
            .join("Application Support")
            .join("Btcd"))
    } else {
        Ok(Path::new(&home).join(".btcd"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home(var: &str) -> Option<String> {
        match var {
            "HOME" => Some("/home/btcd".to_string()),
            "LOCALAPPDATA" => Some(r"C:\Users\btcd\AppData\Local".to_string()),
            _ => None,
        }
    }

    fn rpc_config(tls: TlsConfig) -> RpcConfig {
        RpcConfig {
            host: "127.0.0.1:8334".to_string(),
            username: "rpcuser".to_string(),
            password: "rpcpass".to_string(),
            tls,
            timeout: None,
        }
    }

    #[test]
    fn default_cert_lives_in_btcd_data_dir() {
        let tls = TlsConfig::resolve(false, None, &home).expect("tls");
        match tls {
            TlsConfig::Certificate { path, defaulted } => {
                assert!(defaulted);
                assert!(path.ends_with(CERT_FILE_NAME));
                if cfg!(target_os = "linux") {
                    assert_eq!(path, PathBuf::from("/home/btcd/.btcd/rpc.cert"));
                }
            }
            other => panic!("unexpected tls config: {other:?}"),
        }
    }

    #[test]
    fn explicit_cert_path_is_not_defaulted() {
        let tls = TlsConfig::resolve(false, Some(PathBuf::from("/etc/btcd/rpc.cert")), &home)
            .expect("tls");
        assert_eq!(
            tls,
            TlsConfig::Certificate {
                path: PathBuf::from("/etc/btcd/rpc.cert"),
                defaulted: false,
            }
        );
    }

    #[test]
    fn disabling_tls_skips_the_certificate() {
        let tls = TlsConfig::resolve(true, None, &|_: &str| None).expect("tls");
        assert_eq!(tls, TlsConfig::Disabled);
        assert!(rpc_config(tls).read_certificate().expect("no cert needed").is_none());
    }

    #[test]
    fn missing_home_is_reported_for_default_cert() {
        let err = TlsConfig::resolve(false, None, &|_: &str| None).unwrap_err();
        assert!(matches!(err, ConfigError::NoHomeDir));
        assert!(err.to_string().contains(CERT_PATH_VAR));
    }

    #[test]
    fn unreadable_certificate_is_a_config_error() {
        let cfg = rpc_config(TlsConfig::Certificate {
            path: PathBuf::from("/nonexistent/btcd-exporter/rpc.cert"),
            defaulted: false,
        });
        let err = cfg.read_certificate().unwrap_err();
        assert!(matches!(err, ConfigError::CertUnreadable { .. }));
        assert!(err.to_string().contains("error reading cert file"));
    }

    #[test]
    fn debug_output_redacts_password() {
        let dbg = format!("{:?}", rpc_config(TlsConfig::Disabled));
        assert!(!dbg.contains("rpcpass"));
        assert!(dbg.contains("<redacted>"));
    }
}
