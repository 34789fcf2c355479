//! Authenticated API client for the storefront backend.
//!
//! Every call goes out through one cookie-carrying `reqwest::Client`, so the
//! session credential is attached without callers touching it. When a call
//! comes back 401 the client renews the session once for everyone waiting on
//! it, replays the calls that were blocked, and gives up on the session when
//! renewal is impossible.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{header, Client, Method, Response, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::{
    CookieSessionMarker, RemoteSession, SessionEvent, SessionMarker, SessionService,
    TerminationReason,
};
use crate::config::Config;

use super::refresh::{Claim, RefreshCoordinator, RefreshState};
use super::request::{RequestConfig, RequestSpec};
use super::ApiError;

/// Buffered session events per subscriber before old ones are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Storefront API client with transparent session refresh.
///
/// Clone is cheap and clones share the session: one cookie jar, one refresh
/// cycle, one event channel.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionService>,
    marker: Arc<dyn SessionMarker>,
    coordinator: RefreshCoordinator,
    events: broadcast::Sender<SessionEvent>,
}

/// Builder for [`AuthenticatedClient`].
///
/// Without overrides the client talks to the session endpoints named in the
/// config and reads the session marker cookie from its own jar.
pub struct ClientBuilder {
    config: Config,
    jar: Option<Arc<Jar>>,
    session: Option<Arc<dyn SessionService>>,
    marker: Option<Arc<dyn SessionMarker>>,
}

impl ClientBuilder {
    /// Share an existing cookie jar (e.g. one already holding a session).
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.jar = Some(jar);
        self
    }

    pub fn session_service(mut self, session: Arc<dyn SessionService>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn session_marker(mut self, marker: Arc<dyn SessionMarker>) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn build(self) -> Result<AuthenticatedClient, ApiError> {
        let base = Url::parse(&self.config.base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("invalid base URL {}: {}", self.config.base_url, e))
        })?;

        let jar = self.jar.unwrap_or_default();
        let http = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(self.config.request_timeout())
            .build()?;

        let session = match self.session {
            Some(session) => session,
            None => Arc::new(RemoteSession::new(http.clone(), &self.config)),
        };
        let marker = match self.marker {
            Some(marker) => marker,
            None => Arc::new(CookieSessionMarker::new(jar, base, self.config.session_cookie.clone())),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(AuthenticatedClient {
            http,
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            session,
            marker,
            coordinator: RefreshCoordinator::new(),
            events,
        })
    }
}

impl AuthenticatedClient {
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder {
            config,
            jar: None,
            session: None,
            marker: None,
        }
    }

    /// Client with the default session endpoints and cookie marker.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        Self::builder(config).build()
    }

    /// The underlying transport. Shares this client's cookie jar.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Receive `Refreshed` / `Terminated` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.coordinator.state()
    }

    /// Number of calls currently parked behind a refresh.
    pub fn pending_requests(&self) -> usize {
        self.coordinator.pending()
    }

    pub async fn get<T>(&self, path: &str, config: Option<RequestConfig>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let spec = Self::spec::<()>(Method::GET, path, None, config)?;
        self.execute(spec).await
    }

    pub async fn post<T, B>(
        &self,
        path: &str,
        body: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let spec = Self::spec(Method::POST, path, body, config)?;
        self.execute(spec).await
    }

    pub async fn put<T, B>(
        &self,
        path: &str,
        body: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let spec = Self::spec(Method::PUT, path, body, config)?;
        self.execute(spec).await
    }

    pub async fn delete<T>(&self, path: &str, config: Option<RequestConfig>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let spec = Self::spec::<()>(Method::DELETE, path, None, config)?;
        self.execute(spec).await
    }

    pub async fn patch<T, B>(
        &self,
        path: &str,
        body: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let spec = Self::spec(Method::PATCH, path, body, config)?;
        self.execute(spec).await
    }

    fn spec<B>(
        method: Method,
        path: &str,
        body: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<RequestSpec, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(|b| serde_json::to_vec(b))
            .transpose()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize request body: {}", e)))?;

        Ok(RequestSpec {
            method,
            path: path.to_string(),
            body,
            config: config.unwrap_or_default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue a call, renewing the session at most once on a 401.
    async fn execute<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        let mut retried = false;

        let response = loop {
            match self.send_once(&spec).await {
                Ok(response) => break response,
                Err(err) if err.is_unauthorized() && !retried => {
                    if !self.marker.has_session() {
                        debug!(method = %spec.method, path = %spec.path, "401 without a session");
                        self.terminate_session(TerminationReason::NoSession).await;
                        return Err(err);
                    }
                    retried = true;
                    self.recover(&spec).await?;
                    debug!(method = %spec.method, path = %spec.path, "replaying after session refresh");
                }
                Err(err) => return Err(err),
            }
        };

        Self::decode(response).await
    }

    /// Wait for a usable session: either run the refresh or queue behind it.
    async fn recover(&self, spec: &RequestSpec) -> Result<(), ApiError> {
        match self.coordinator.claim(&spec.method, &spec.path) {
            Claim::Queued(outcome) => outcome.await.unwrap_or(Err(ApiError::RefreshAbandoned)),
            Claim::Owner(guard) => {
                info!("Session expired, refreshing");
                let outcome = self
                    .session
                    .refresh()
                    .await
                    .map_err(|e| ApiError::RefreshFailed(Box::new(e)));
                let released = guard.settle(&outcome).len();

                match outcome {
                    Ok(()) => {
                        info!(released, "Session refreshed");
                        let _ = self.events.send(SessionEvent::Refreshed);
                        Ok(())
                    }
                    Err(err) => {
                        warn!(error = %err, released, "Session refresh failed");
                        self.terminate_session(TerminationReason::RefreshFailed).await;
                        Err(err)
                    }
                }
            }
        }
    }

    /// Best-effort logout followed by the `Terminated` event.
    async fn terminate_session(&self, reason: TerminationReason) {
        if let Err(err) = self.session.logout().await {
            warn!(error = %err, "Logout failed while terminating session");
        }
        info!(reason = reason.description(), "Session terminated");
        // No subscribers is fine
        let _ = self.events.send(SessionEvent::Terminated(reason));
    }

    async fn send_once(&self, spec: &RequestSpec) -> Result<Response, ApiError> {
        let url = self.url(&spec.path);

        let mut request = self
            .http
            .request(spec.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if !spec.config.query.is_empty() {
            request = request.query(&spec.config.query);
        }
        if !spec.config.headers.is_empty() {
            request = request.headers(spec.config.headers.clone());
        }
        if let Some(timeout) = spec.config.timeout {
            request = request.timeout(timeout);
        }
        if let Some(ref body) = spec.body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        debug!(method = %spec.method, url = %url, "sending request");
        let response = request.send().await?;
        debug!(method = %spec.method, url = %url, status = %response.status(), "received response");

        check_response(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().clone();
        let bytes = response.bytes().await?;
        // Empty bodies (204) decode as JSON null so `()` and `Option<_>` work
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

/// Check if response is successful, returning an error built from the body if not.
pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_bad_base_url() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            AuthenticatedClient::new(config),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_url_joining() {
        let config = Config {
            base_url: "https://shop.example.com/api/".to_string(),
            ..Config::default()
        };
        let client = AuthenticatedClient::new(config).expect("client");
        assert_eq!(client.base_url(), "https://shop.example.com/api");
        assert_eq!(client.url("/products"), "https://shop.example.com/api/products");
        assert_eq!(client.url("cart/items"), "https://shop.example.com/api/cart/items");
    }

    #[test]
    fn test_spec_serializes_body_once() {
        let body = serde_json::json!({"productId": "p-1", "quantity": 2});
        let spec = AuthenticatedClient::spec(Method::POST, "/cart/items", Some(&body), None)
            .expect("spec");
        let bytes = spec.body.expect("body");
        let roundtrip: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(roundtrip, body);
        assert!(spec.config.query.is_empty());
    }

    #[test]
    fn test_new_client_starts_idle() {
        let client = AuthenticatedClient::new(Config::default()).expect("client");
        assert_eq!(client.refresh_state(), RefreshState::Idle);
        assert_eq!(client.pending_requests(), 0);
    }
}
