//! Configuration utilities (ports, static dir, remote store env vars)

use std::{env, net::{Ipv4Addr, SocketAddr}, time::Duration};
use std::path::{Path, PathBuf};

/// Socket address to bind the server to.
///
/// Reads the `PORT` env var or defaults to 8080, binds to 0.0.0.0.
pub fn server_addr() -> SocketAddr {
    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Resolve the static frontend directory.
/// Order:
/// 1) STATIC_DIR env var
/// 2) ./frontend/dist (container runtime layout)
/// 3) ../frontend/dist (local dev)
pub fn static_dir() -> PathBuf {
    if let Ok(p) = env::var("STATIC_DIR") {
        return PathBuf::from(p);
    }
    let p1 = Path::new("./frontend/dist");
    if p1.exists() { return p1.to_path_buf(); }
    PathBuf::from("../frontend/dist")
}

/// Request timeout for the remote store, `STORE_TIMEOUT_SECS` or 10s.
pub fn store_timeout() -> Duration {
    let secs = env::var("STORE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(10);
    Duration::from_secs(secs)
}

/// Base URL and request headers for the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHeaders {
    pub base_url: String,
    pub headers: Vec<(&'static str, String)>,
}

/// Reads `STORE_URL` and `STORE_ANON_KEY` once and runs them through
/// [`store_headers`].
pub fn store_from_env() -> Option<StoreHeaders> {
    let url = env::var("STORE_URL").ok();
    let key = env::var("STORE_ANON_KEY").ok();
    store_headers(url.as_deref(), key.as_deref())
}

/// Headers-or-none gate: `None` unless both the base URL and the API key are
/// present and non-blank.
pub fn store_headers(url: Option<&str>, key: Option<&str>) -> Option<StoreHeaders> {
    let url = url.map(str::trim).filter(|u| !u.is_empty())?;
    let key = key.map(str::trim).filter(|k| !k.is_empty())?;
    Some(StoreHeaders {
        base_url: url.trim_end_matches('/').to_owned(),
        headers: vec![
            ("content-type", "application/json".to_owned()),
            ("apikey", key.to_owned()),
            ("authorization", format!("Bearer {key}")),
            ("accept-profile", "public".to_owned()),
            ("prefer", "return=representation".to_owned()),
        ],
    })
}
