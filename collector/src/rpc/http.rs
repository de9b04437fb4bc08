//! HTTP-based btcd RPC client.
//!
//! This implementation of [`crate::rpc::NodeRpc`] talks to btcd's JSON-RPC
//! server over HTTP POST with basic authentication. btcd speaks JSON-RPC
//! 1.0:
//!
//! ```json
//! POST /
//! {
//!   "jsonrpc": "1.0",
//!   "id": 7,
//!   "method": "getblockheader",
//!   "params": ["000000000000000000026f...", true]
//! }
//!
//! Response:
//! {
//!   "result": { "hash": "...", "height": 800000, "time": 1690168629, ... },
//!   "error": null,
//!   "id": 7
//! }
//! ```
//!
//! When TLS is enabled the node's self-signed certificate is the only trusted
//! root; the platform trust store is not consulted.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::blocking::Client;
use reqwest::{Certificate, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{RpcConfig, TlsConfig};
use crate::rpc::{BlockHeader, NetTotals, NodeInfo, NodeRpc, RpcError};
use crate::types::BlockHash;

/// Maximum number of bytes of a non-JSON error body kept in [`RpcError::Http`].
const MAX_ERROR_BODY: usize = 256;

/// HTTP-based btcd RPC client.
///
/// This client is thread-safe (`Send + Sync`) and is shared by every scrape.
/// It holds one `reqwest` blocking client for the process lifetime, so
/// connections are kept alive and reused between calls. Callers running on
/// an async runtime must invoke it from a blocking context.
pub struct BtcdRpcClient {
    url: String,
    username: String,
    password: String,
    client: Client,
    next_id: AtomicU64,
}

impl BtcdRpcClient {
    /// Constructs a new client for the node described by `cfg`.
    ///
    /// `cert_pem` must hold the node's PEM certificate when TLS is enabled.
    pub fn new(cfg: &RpcConfig, cert_pem: Option<&[u8]>) -> Result<Self, RpcError> {
        // The node is always dialled directly, never through a system proxy.
        let mut builder = Client::builder().no_proxy();
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }

        let scheme = match (&cfg.tls, cert_pem) {
            (TlsConfig::Disabled, _) => "http",
            (TlsConfig::Certificate { .. }, Some(pem)) => {
                let cert = Certificate::from_pem(pem).map_err(|e| {
                    RpcError::Transport(format!("invalid node certificate: {}", error_chain(&e)))
                })?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(cert);
                "https"
            }
            (TlsConfig::Certificate { path, .. }, None) => {
                return Err(RpcError::Transport(format!(
                    "TLS enabled but certificate {} was not loaded",
                    path.display()
                )));
            }
        };

        let client = builder
            .build()
            .map_err(|e| {
                RpcError::Transport(format!("failed to build HTTP client: {}", error_chain(&e)))
            })?;

        Ok(Self {
            url: endpoint(scheme, &cfg.host),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// URL every request is posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RpcError> {
        let req_body = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&req_body)
            .send()
            .map_err(|e| {
                RpcError::Transport(format!(
                    "{method} POST {} failed: {}",
                    self.url,
                    error_chain(&e)
                ))
            })?;

        let status = resp.status();
        let body = resp.text().map_err(|e| {
            RpcError::Transport(format!(
                "{method}: failed to read response: {}",
                error_chain(&e)
            ))
        })?;

        tracing::trace!(method, %status, "rpc response received");
        decode_response(method, status, &body)
    }
}

/// Formats `err` followed by every error in its `source()` chain.
///
/// `reqwest` keeps the useful part (refused connection, TLS alert, timeout)
/// a few levels down, behind a generic "error sending request" message.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        // hyper and reqwest sometimes repeat the inner message verbatim.
        if !out.ends_with(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = cause.source();
    }
    out
}

fn endpoint(scheme: &str, host: &str) -> String {
    // Tolerate a host given with a scheme or trailing slash.
    let host = host
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("{scheme}://{host}/")
}

/// JSON-RPC 1.0 request envelope.
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

/// JSON-RPC 1.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Turns a raw HTTP response into the typed result of `method`.
///
/// btcd reports JSON-RPC errors inside the envelope (sometimes alongside a
/// 500 status), while authentication failures come back as bare HTTP
/// statuses, so the envelope is tried first and the status only decides how
/// an unparseable body is reported.
fn decode_response<T: DeserializeOwned>(
    method: &str,
    status: StatusCode,
    body: &str,
) -> Result<T, RpcError> {
    let envelope: RpcResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(RpcError::Http {
                status: status.as_u16(),
                body: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }
        Err(e) => {
            return Err(RpcError::Protocol(format!(
                "failed to parse {method} response: {e}"
            )));
        }
    };

    if let Some(err) = envelope.error {
        return Err(RpcError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    envelope
        .result
        .ok_or_else(|| RpcError::Protocol(format!("{method} response has no result")))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

impl NodeRpc for BtcdRpcClient {
    fn get_info(&self) -> Result<NodeInfo, RpcError> {
        self.call("getinfo", Vec::new())
    }

    fn get_net_totals(&self) -> Result<NetTotals, RpcError> {
        self.call("getnettotals", Vec::new())
    }

    fn get_best_block_hash(&self) -> Result<BlockHash, RpcError> {
        let hex: String = self.call("getbestblockhash", Vec::new())?;
        BlockHash::from_hex(&hex)
            .map_err(|e| RpcError::Protocol(format!("getbestblockhash returned {hex:?}: {e}")))
    }

    fn get_block_header(&self, hash: &BlockHash) -> Result<BlockHeader, RpcError> {
        self.call("getblockheader", vec![json!(hash.to_hex()), json!(true)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

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
    fn endpoint_normalises_host() {
        assert_eq!(endpoint("https", "node:8334"), "https://node:8334/");
        assert_eq!(endpoint("http", "http://node:8334/"), "http://node:8334/");
    }

    #[test]
    fn plain_http_client_builds_without_certificate() {
        let client = BtcdRpcClient::new(&rpc_config(TlsConfig::Disabled), None)
            .expect("client should build");
        assert_eq!(client.url(), "http://127.0.0.1:8334/");
    }

    #[test]
    fn tls_client_requires_certificate() {
        let tls = TlsConfig::Certificate {
            path: PathBuf::from("/tmp/rpc.cert"),
            defaulted: false,
        };
        let err = BtcdRpcClient::new(&rpc_config(tls.clone()), None).err().expect("no cert");
        assert!(matches!(err, RpcError::Transport(_)));

        let err = BtcdRpcClient::new(&rpc_config(tls), Some(b"not a certificate"))
            .err()
            .expect("garbage cert");
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn request_envelope_is_json_rpc_1() {
        let req = RpcRequest {
            jsonrpc: "1.0",
            id: 3,
            method: "getblockheader",
            params: vec![json!("00ff"), json!(true)],
        };
        let value = serde_json::to_value(&req).expect("request serializes");
        assert_eq!(
            value,
            json!({
                "jsonrpc": "1.0",
                "id": 3,
                "method": "getblockheader",
                "params": ["00ff", true]
            })
        );
    }

    #[test]
    fn getinfo_response_can_be_decoded() {
        let body = r#"
        {
          "result": {
            "version": 120000,
            "protocolversion": 70002,
            "blocks": 800000,
            "timeoffset": 0,
            "connections": 8,
            "proxy": "",
            "difficulty": 55000000000000.0,
            "testnet": false,
            "relayfee": 0.00001,
            "errors": ""
          },
          "error": null,
          "id": 1
        }
        "#;

        let info: NodeInfo =
            decode_response("getinfo", StatusCode::OK, body).expect("getinfo should decode");
        assert_eq!(info.blocks, 800_000);
        assert_eq!(info.connections, 8);
        assert_eq!(info.difficulty, 55e12);
    }

    #[test]
    fn getnettotals_and_header_responses_can_be_decoded() {
        let body = r#"{"result":{"totalbytesrecv":2000000,"totalbytessent":1000000,"timemillis":1700000000123},"error":null,"id":2}"#;
        let totals: NetTotals = decode_response("getnettotals", StatusCode::OK, body)
            .expect("getnettotals should decode");
        assert_eq!(totals.total_bytes_sent, 1_000_000);
        assert_eq!(totals.total_bytes_recv, 2_000_000);

        let body = r#"
        {
          "result": {
            "hash": "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054",
            "confirmations": 1,
            "height": 800000,
            "version": 536870912,
            "versionHex": "20000000",
            "merkleroot": "b9f6a8f4c0d7bbc5d5d6e5f1f2ae7b8e1a4b0f4d5c6e7f8a9b0c1d2e3f4a5b6c",
            "time": 1700000000,
            "nonce": 1234,
            "bits": "17053894",
            "difficulty": 55000000000000.0,
            "previousblockhash": "0000000000000000000392c6b8a0bb0e2f4c7e9d8a1b2c3d4e5f6a7b8c9d0e1f"
          },
          "error": null,
          "id": 4
        }
        "#;
        let header: BlockHeader = decode_response("getblockheader", StatusCode::OK, body)
            .expect("getblockheader should decode");
        assert_eq!(header.time, 1_700_000_000);
    }

    #[test]
    fn rpc_error_object_is_surfaced() {
        let body = r#"{"result":null,"error":{"code":-5,"message":"Block not found"},"id":5}"#;
        let err = decode_response::<BlockHeader>(
            "getblockheader",
            StatusCode::INTERNAL_SERVER_ERROR,
            body,
        )
        .unwrap_err();
        match err {
            RpcError::Rpc { code, message } => {
                assert_eq!(code, -5);
                assert_eq!(message, "Block not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bare_http_failure_is_reported_with_status() {
        let err =
            decode_response::<NodeInfo>("getinfo", StatusCode::UNAUTHORIZED, "401 Unauthorized.\n")
                .unwrap_err();
        match err {
            RpcError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "401 Unauthorized.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_or_empty_result_is_a_protocol_error() {
        let err = decode_response::<NodeInfo>("getinfo", StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));

        let body = r#"{"result":null,"error":null,"id":1}"#;
        let err = decode_response::<NodeInfo>("getinfo", StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(ref msg) if msg.contains("no result")));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY * 2);
        let out = truncate(&body, MAX_ERROR_BODY);
        assert_eq!(out.len(), MAX_ERROR_BODY + 3);
        assert!(out.ends_with("..."));
    }

    /// Base64 of `rpcuser:rpcpass`.
    const BASIC_CREDENTIALS: &str = "Basic cnBjdXNlcjpycGNwYXNz";

    fn plain_client(host: &str) -> BtcdRpcClient {
        let cfg = RpcConfig {
            host: host.to_string(),
            timeout: Some(Duration::from_secs(5)),
            ..rpc_config(TlsConfig::Disabled)
        };
        BtcdRpcClient::new(&cfg, None).expect("client should build")
    }

    /// Reads one request (head plus `Content-Length` body) off `stream`.
    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).expect("read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let body_len = header(&text[..head_end], "content-length")
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    /// Answers exactly one HTTP exchange on a loopback port.
    ///
    /// Returns the `host:port` to dial and a handle yielding the raw request.
    fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr").to_string();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            request
        });
        (addr, handle)
    }

    #[test]
    fn call_posts_authenticated_json_rpc_to_root() {
        let (addr, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"result":{"blocks":800000,"connections":8,"difficulty":55000000000000.0},"error":null,"id":1}"#,
        );

        let info = plain_client(&addr).get_info().expect("getinfo should succeed");
        assert_eq!(info.blocks, 800_000);
        assert_eq!(info.connections, 8);

        let request = server.join().expect("server thread");
        let (head, body) = request.split_once("\r\n\r\n").expect("request head");
        assert!(head.starts_with("POST / HTTP/1.1\r\n"), "{head}");
        assert_eq!(header(head, "authorization"), Some(BASIC_CREDENTIALS));
        assert!(header(head, "content-type").is_some_and(|v| v.starts_with("application/json")));

        let sent: Value = serde_json::from_str(body).expect("request body is JSON");
        assert_eq!(sent["jsonrpc"], "1.0");
        assert_eq!(sent["method"], "getinfo");
        assert_eq!(sent["params"], json!([]));
    }

    #[test]
    fn rejected_credentials_surface_as_http_error() {
        let (addr, server) = serve_once("HTTP/1.1 401 Unauthorized", "401 Unauthorized.\n");

        let err = plain_client(&addr).get_net_totals().unwrap_err();
        server.join().expect("server thread");
        match err {
            RpcError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "401 Unauthorized.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn refused_connection_reports_underlying_cause() {
        // Bind then drop to get a loopback port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
            listener.local_addr().expect("local addr").to_string()
        };

        let err = plain_client(&addr).get_info().unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)), "{err:?}");

        let msg = err.to_string();
        assert!(msg.contains(&addr), "{msg}");
        assert!(msg.to_lowercase().contains("refused"), "{msg}");
    }
}
