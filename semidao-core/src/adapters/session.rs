//! Cookie-preserving HTTP session
//!
//! One `PortalSession` is created per run. It owns the cookie jar, so every
//! request sent through it carries the cookies set by earlier responses, and
//! nothing leaks between runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use url::Url;

use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::ports::DocumentFetcher;

/// Response returned to the caller: status, headers and body text
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl PortalResponse {
    /// Value of the `Location` header, if present and valid UTF-8
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// HTTP client bound to a single cookie jar
#[derive(Debug)]
pub struct PortalSession {
    client: Client,
    jar: Arc<Jar>,
    timeout: Duration,
}

impl PortalSession {
    /// Create a session with an empty jar
    ///
    /// Redirects are never followed: the login contract is read from the
    /// raw 302 response.
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let jar = Arc::new(Jar::default());

        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::none())
            .timeout(timeout);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua.to_string());
        }

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            jar,
            timeout,
        })
    }

    /// Send a request carrying the jar and return the response
    ///
    /// `Set-Cookie` headers are folded into the jar before this returns.
    /// No retry is attempted.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        form: Option<&[(String, String)]>,
    ) -> Result<PortalResponse> {
        let mut request = self.client.request(method, url);
        if let Some(fields) = form {
            request = request.form(fields);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_request_error(e))?;

        Ok(PortalResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, url: &str) -> Result<PortalResponse> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<PortalResponse> {
        self.send(Method::POST, url, Some(form)).await
    }

    /// Download a binary resource; any non-2xx status is an error
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Download of {} failed: HTTP {}", url, status.as_u16());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        Ok(bytes.to_vec())
    }

    /// `Cookie` header the jar would send to `url`
    pub fn cookie_header(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        self.jar
            .cookies(&parsed)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> anyhow::Error {
        if error.is_timeout() {
            anyhow::anyhow!("Connection timed out after {} seconds", self.timeout.as_secs())
        } else if error.is_connect() {
            anyhow::anyhow!("Unable to connect to the portal")
        } else {
            anyhow::anyhow!("Portal request failed: {}", error)
        }
    }
}

#[async_trait]
impl DocumentFetcher for PortalSession {
    async fn fetch_document(&self, url: &str) -> DomainResult<Vec<u8>> {
        self.get_bytes(url)
            .await
            .map_err(|e| DomainError::transport(e.to_string()))
    }
}
