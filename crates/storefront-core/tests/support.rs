#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use storefront_core::api::ApiError;
use storefront_core::auth::SessionService;
use storefront_core::{AuthenticatedClient, Config};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Session service double that counts calls and answers after a delay.
pub struct StubSession {
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    delay: Duration,
    refresh_error: Option<ApiError>,
}

impl StubSession {
    pub fn succeeding(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            delay,
            refresh_error: None,
        })
    }

    pub fn failing(delay: Duration, error: ApiError) -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            delay,
            refresh_error: Some(error),
        })
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionService for StubSession {
    async fn refresh(&self) -> Result<(), ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.refresh_error {
            Some(ref err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        // Logout failures must never reach the caller
        Err(ApiError::Network("logout endpoint unreachable".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Item {
    pub name: String,
}

pub fn config_for(server: &MockServer) -> Config {
    Config {
        base_url: server.uri(),
        ..Config::default()
    }
}

/// Client whose session service is `session` and whose marker is fixed.
pub fn client_with(server: &MockServer, session: Arc<StubSession>, has_session: bool) -> AuthenticatedClient {
    AuthenticatedClient::builder(config_for(server))
        .session_service(session)
        .session_marker(Arc::new(move || has_session))
        .build()
        .expect("client")
}

pub fn expired() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(serde_json::json!({"message": "jwt expired"}))
}

/// GET `route` answers 401 once, then `name` on the replay.
pub async fn mount_expiring_once(server: &MockServer, route: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(expired())
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": name})))
        .with_priority(2)
        .expect(1)
        .mount(server)
        .await;
}

/// Matches requests whose Cookie header carries `name=value`.
pub struct CookieContains(pub &'static str);

impl Match for CookieContains {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get("cookie")
            .and_then(|value| value.to_str().ok())
            .map_or(false, |cookies| cookies.split(';').any(|pair| pair.trim() == self.0))
    }
}
