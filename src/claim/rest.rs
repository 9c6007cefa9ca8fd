//! Reqwest-backed PostgREST adapter for [`StoreTransport`].
//!
//! Owns URLs, headers and the HTTP client. Every completed request is handed
//! back as status plus raw body; classification happens in the pipeline.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, RequestBuilder, Url,
};
use serde_json::json;

use super::transport::{ClaimRequest, StoreResponse, StoreTransport, TransportError};
use crate::config::StoreHeaders;

const CLAIM_PROCEDURE_PATH: &str = "rest/v1/rpc/claim_code";
const ACCESS_CODES_PATH: &str = "rest/v1/access_codes";

#[derive(thiserror::Error, Debug)]
pub enum RestSetupError {
    #[error("invalid store url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid header {0}")]
    Header(&'static str),
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct RestTransport {
    client: Client,
    base: Url,
}

impl RestTransport {
    /// Build the adapter with an explicit request timeout. The store headers
    /// are installed as client defaults.
    pub fn new(store: &StoreHeaders, timeout: Duration) -> Result<Self, RestSetupError> {
        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = Url::parse(&format!("{}/", store.base_url.trim_end_matches('/')))?;
        let mut headers = HeaderMap::new();
        for &(name, ref value) in &store.headers {
            let value = HeaderValue::from_str(value).map_err(|_| RestSetupError::Header(name))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client, base })
    }

    fn claim_procedure_url(&self) -> Result<Url, TransportError> {
        self.base
            .join(CLAIM_PROCEDURE_PATH)
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    fn access_codes_url(
        &self,
        request: &ClaimRequest,
        only_unclaimed: bool,
    ) -> Result<Url, TransportError> {
        let mut url = self
            .base
            .join(ACCESS_CODES_PATH)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        {
            // Form encoding: a space goes out as `+` and a literal `+` as `%2B`,
            // so codes containing either stay distinct.
            let mut query = url.query_pairs_mut();
            query
                .append_pair("code", &format!("eq.{}", request.code))
                .append_pair("room", &format!("eq.{}", request.room));
            if only_unclaimed {
                query.append_pair("used_at", "is.null");
            }
        }
        Ok(url)
    }
}

/// Transport for the configured store, or `None` when the store is missing
/// or its settings are unusable. Claims then fail with `config`.
pub fn transport_from_config(
    store: Option<&StoreHeaders>,
    timeout: Duration,
) -> Option<Arc<dyn StoreTransport>> {
    let Some(store) = store else {
        tracing::warn!("STORE_URL or STORE_ANON_KEY missing; every unlock will fail with `config`");
        return None;
    };
    match RestTransport::new(store, timeout) {
        Ok(transport) => {
            tracing::info!(base_url = %store.base_url, "remote store configured");
            Some(Arc::new(transport))
        }
        Err(error) => {
            tracing::error!(%error, "remote store settings rejected; every unlock will fail with `config`");
            None
        }
    }
}

async fn send(builder: RequestBuilder) -> Result<StoreResponse, TransportError> {
    let response = builder.send().await.map_err(map_transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;
    Ok(StoreResponse::new(status, body))
}

fn map_transport_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[async_trait]
impl StoreTransport for RestTransport {
    async fn call_claim_procedure(
        &self,
        request: &ClaimRequest,
    ) -> Result<StoreResponse, TransportError> {
        let url = self.claim_procedure_url()?;
        send(self.client.post(url).json(request)).await
    }

    async fn update_unclaimed(
        &self,
        request: &ClaimRequest,
        used_at: &str,
    ) -> Result<StoreResponse, TransportError> {
        let url = self.access_codes_url(request, true)?;
        send(self.client.patch(url).json(&json!({ "used_at": used_at }))).await
    }

    async fn select_codes(&self, request: &ClaimRequest) -> Result<StoreResponse, TransportError> {
        let url = self.access_codes_url(request, false)?;
        send(self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store_headers;
    use axum::extract::State;
    use axum::http::{Method, StatusCode, Uri};
    use axum::Router;
    use parking_lot::Mutex;

    fn transport(base: &str) -> RestTransport {
        let store = store_headers(Some(base), Some("anon")).unwrap();
        RestTransport::new(&store, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn procedure_url_keeps_base_path() {
        let t = transport("https://db.example/tenant");
        assert_eq!(
            t.claim_procedure_url().unwrap().as_str(),
            "https://db.example/tenant/rest/v1/rpc/claim_code"
        );
    }

    #[test]
    fn conditional_update_url_filters_unclaimed_rows() {
        let t = transport("https://db.example");
        let url = t.access_codes_url(&ClaimRequest::new("r1", "ABC123"), true).unwrap();
        assert_eq!(
            url.as_str(),
            "https://db.example/rest/v1/access_codes?code=eq.ABC123&room=eq.r1&used_at=is.null"
        );
    }

    #[test]
    fn filter_values_are_encoded() {
        let t = transport("https://db.example");
        let url = t
            .access_codes_url(&ClaimRequest::new("christmas-room", "A&B=C"), false)
            .unwrap();
        assert_eq!(url.query(), Some("code=eq.A%26B%3DC&room=eq.christmas-room"));
    }

    #[test]
    fn plus_and_space_are_encoded_differently() {
        let t = transport("https://db.example");
        let url = t
            .access_codes_url(&ClaimRequest::new("r1", "A+B C"), false)
            .unwrap();
        assert_eq!(url.query(), Some("code=eq.A%2BB+C&room=eq.r1"));
    }

    #[test]
    fn unusable_settings_leave_store_unconfigured() {
        let bad = store_headers(Some("not a url"), Some("anon")).unwrap();
        assert!(transport_from_config(Some(&bad), Duration::from_secs(1)).is_none());
        assert!(transport_from_config(None, Duration::from_secs(1)).is_none());
        let good = store_headers(Some("https://db.example"), Some("anon")).unwrap();
        assert!(transport_from_config(Some(&good), Duration::from_secs(1)).is_some());
    }

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
        body: String,
    }

    type SeenLog = Arc<Mutex<Vec<Seen>>>;

    async fn record(
        State(log): State<SeenLog>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> String {
        let reply = match method {
            Method::POST => "null",
            _ => "[]",
        };
        log.lock().push(Seen {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            headers,
            body,
        });
        reply.to_owned()
    }

    /// Local HTTP server that records every request it receives.
    async fn recording_store() -> (String, SeenLog) {
        let log = SeenLog::default();
        let app = Router::new().fallback(record).with_state(log.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), log)
    }

    #[tokio::test]
    async fn requests_match_postgrest_wire_format() {
        let (base, log) = recording_store().await;
        let store = store_headers(Some(&base), Some("anon")).unwrap();
        let rest = RestTransport::new(&store, Duration::from_secs(5)).unwrap();
        let request = ClaimRequest::new("r1", "A B");

        let primary = rest.call_claim_procedure(&request).await.unwrap();
        assert_eq!(primary.status, StatusCode::OK);
        assert_eq!(primary.body, "null");
        rest.update_unclaimed(&request, "2024-12-24T18:00:00.000Z").await.unwrap();
        rest.select_codes(&request).await.unwrap();

        let seen = log.lock().clone();
        assert_eq!(seen.len(), 3);
        for s in &seen {
            assert_eq!(s.headers["apikey"], "anon");
            assert_eq!(s.headers["authorization"], "Bearer anon");
            assert_eq!(s.headers["prefer"], "return=representation");
            assert_eq!(s.headers["accept-profile"], "public");
        }

        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].path, "/rest/v1/rpc/claim_code");
        assert_eq!(seen[0].headers["content-type"], "application/json");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&seen[0].body).unwrap(),
            json!({ "code": "A B", "room": "r1" })
        );

        assert_eq!(seen[1].method, Method::PATCH);
        assert_eq!(seen[1].path, "/rest/v1/access_codes");
        assert_eq!(seen[1].query.as_deref(), Some("code=eq.A+B&room=eq.r1&used_at=is.null"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&seen[1].body).unwrap(),
            json!({ "used_at": "2024-12-24T18:00:00.000Z" })
        );

        assert_eq!(seen[2].method, Method::GET);
        assert_eq!(seen[2].path, "/rest/v1/access_codes");
        assert_eq!(seen[2].query.as_deref(), Some("code=eq.A+B&room=eq.r1"));
        assert!(seen[2].body.is_empty());
    }

    #[tokio::test]
    async fn unreachable_store_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let store = store_headers(Some(&format!("http://{addr}")), Some("anon")).unwrap();
        let rest = RestTransport::new(&store, Duration::from_secs(5)).unwrap();
        let answer = rest.select_codes(&ClaimRequest::new("r1", "A")).await;
        assert!(matches!(answer, Err(TransportError::Request(_))), "{answer:?}");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let store = store_headers(Some("not a url"), Some("anon")).unwrap();
        assert!(matches!(
            RestTransport::new(&store, Duration::from_secs(1)),
            Err(RestSetupError::Url(_))
        ));
    }
}
