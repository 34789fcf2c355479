use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, Client, Url};
use tracing::{debug, info};

use crate::api::client::check_response;
use crate::api::ApiError;
use crate::config::Config;
use crate::models::{Credentials, UserProfile};

/// Server-side session operations the client depends on.
///
/// `refresh` renews the short-lived credential from whatever long-lived one
/// the transport holds; `logout` invalidates the session and is best-effort
/// from the caller's point of view.
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn refresh(&self) -> Result<(), ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
}

/// Cheap local check of whether a session is believed to exist.
pub trait SessionMarker: Send + Sync {
    fn has_session(&self) -> bool;
}

impl<F> SessionMarker for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn has_session(&self) -> bool {
        self()
    }
}

/// Session marker backed by a cookie in the shared jar.
///
/// The backend sets a readable marker cookie alongside the http-only session
/// cookies; its presence is what "logged in" means locally.
pub struct CookieSessionMarker {
    jar: Arc<Jar>,
    url: Url,
    cookie_name: String,
}

impl CookieSessionMarker {
    pub fn new(jar: Arc<Jar>, url: Url, cookie_name: impl Into<String>) -> Self {
        Self {
            jar,
            url,
            cookie_name: cookie_name.into(),
        }
    }
}

impl SessionMarker for CookieSessionMarker {
    fn has_session(&self) -> bool {
        let Some(cookies) = self.jar.cookies(&self.url) else {
            return false;
        };
        let Ok(cookies) = cookies.to_str() else {
            return false;
        };
        cookies
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .any(|(name, value)| name == self.cookie_name && !value.is_empty())
    }
}

/// HTTP implementation of the session endpoints.
///
/// Shares the cookie-carrying `reqwest::Client` with the authenticated
/// client, so cookies set by login and refresh are what later calls send.
#[derive(Clone)]
pub struct RemoteSession {
    client: Client,
    base_url: String,
    login_path: String,
    refresh_path: String,
    logout_path: String,
}

impl RemoteSession {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            login_path: config.login_path.clone(),
            refresh_path: config.refresh_path.clone(),
            logout_path: config.logout_path.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Log in with email and password; the server answers with session
    /// cookies and the user's profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let url = self.url(&self.login_path);
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&credentials)
            .send()
            .await?;
        let response = check_response(response).await?;

        let profile: UserProfile = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;
        info!(user_id = %profile.id, "Logged in");
        Ok(profile)
    }

    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(url = %url, "session request");
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionService for RemoteSession {
    async fn refresh(&self) -> Result<(), ApiError> {
        self.post_empty(&self.refresh_path).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.post_empty(&self.logout_path).await
    }
}
