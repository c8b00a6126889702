//! HTTP transport
//!
//! A thin wrapper over `reqwest` that every REST call goes through:
//! - resolves paths against the configured base URL
//! - injects the bearer token (a per-client override, else the stored one)
//! - on `401` clears the stored session and navigates to the login route
//! - normalizes every failure into [`ApiError`]

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ApiSettings;
use crate::navigation::Navigator;
use crate::persistence::SessionStore;
use crate::utils::error::{ApiError, ClientError, Result};

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    login_route: String,
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(
        settings: &ApiSettings,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            login_route: settings.login_route.clone(),
            session,
            navigator,
            token: None,
        })
    }

    /// A client sending `token` instead of the stored session token.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        format!("{base}/{suffix}")
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request = self.client.get(self.endpoint(path)).query(query);
        self.send(request).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.endpoint(path)).json(body);
        self.send(request).await
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = match &self.token {
            Some(token) => Some(token.clone()),
            None => self.session.token()?,
        };
        Ok(match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self
            .authorize(request)?
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized();
            return Err(ClientError::Unauthorized);
        }

        let body = response.text().await.map_err(ApiError::from)?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "request failed");
            return Err(ApiError::from_response(status.as_u16(), &body).into());
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError {
                status: Some(status.as_u16()),
                message: format!("The server response was malformed: {e}"),
            }
            .into()
        })
    }

    fn handle_unauthorized(&self) {
        warn!("request rejected with 401, signing out");
        if let Err(e) = self.session.clear() {
            warn!("failed to clear session: {e}");
        }
        if let Err(e) = self.navigator.navigate(&self.login_route) {
            warn!("failed to navigate to {}: {e}", self.login_route);
        }
    }
}
