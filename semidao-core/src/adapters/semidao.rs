//! Semidao customer portal client
//!
//! Drives the form-based login and fetches the bills page. A client is
//! single-use: it owns one `PortalSession` and walks
//! `Unauthenticated -> SessionEstablished -> Authenticated -> BillsFetched`.
//! Any failure moves it to `Failed` and the caller gets `LOGIN_FAILED`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

use crate::config::{PortalSettings, SessionWarmup};
use crate::domain::result::{Error, Result};
use crate::domain::Credentials;
use crate::ports::LogSink;

use super::session::PortalSession;

pub const HOME_PATH: &str = "home.action";
pub const LOGIN_PATH: &str = "j_security_check";
pub const BILLS_PATH: &str = "displayBills.action";

/// Where the client is in the login sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    SessionEstablished,
    Authenticated,
    BillsFetched,
    Failed,
}

/// Join the portal root and an endpoint path with exactly one slash
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Decide whether a login response means success
///
/// Success is a 302 whose `Location` is present and does not contain
/// `error`. Anything else is a failure with a reason for the log.
pub fn check_login_response(
    status: StatusCode,
    location: Option<&str>,
) -> std::result::Result<(), String> {
    if status != StatusCode::FOUND {
        return Err(format!("login answered HTTP {} instead of a redirect", status.as_u16()));
    }
    match location {
        None => Err("login redirect carried no Location header".to_string()),
        Some(loc) if loc.contains("error") => Err("login redirected to an error page".to_string()),
        Some(_) => Ok(()),
    }
}

pub struct SemidaoClient {
    session: PortalSession,
    base_url: String,
    warmup: SessionWarmup,
    log: Arc<dyn LogSink>,
    state: AuthState,
}

impl SemidaoClient {
    /// Create a client with a fresh session
    pub fn new(settings: &PortalSettings, log: Arc<dyn LogSink>) -> Result<Self> {
        let session = PortalSession::new(
            Duration::from_secs(settings.request_timeout_secs),
            settings.user_agent.as_deref(),
        )
        .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            session,
            base_url: settings.base_url.clone(),
            warmup: settings.session_warmup,
            log,
            state: AuthState::Unauthenticated,
        })
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session, for downloading documents with the run's cookies
    pub fn session(&self) -> &PortalSession {
        &self.session
    }

    fn fail(&mut self, message: &str) -> Error {
        self.state = AuthState::Failed;
        self.log.error(&format!("Authentication error: {}", message));
        Error::login_failed(message)
    }

    /// GET the home page so the portal issues a session cookie
    pub async fn open_session(&mut self) -> Result<()> {
        let url = endpoint(&self.base_url, HOME_PATH);
        match self.session.get(&url).await {
            Ok(response) => {
                self.log.debug(&format!(
                    "Session opened: HTTP {} ({} header(s))",
                    response.status.as_u16(),
                    response.headers.len()
                ));
            }
            Err(e) => match self.warmup {
                SessionWarmup::Soft => {
                    self.log.error(&format!("Could not open session: {}", e));
                }
                SessionWarmup::Strict => {
                    return Err(self.fail(&format!("could not open session: {}", e)));
                }
            },
        }
        self.state = AuthState::SessionEstablished;
        Ok(())
    }

    /// POST the login form and check the redirect contract
    pub async fn log_in(&mut self, credentials: &Credentials) -> Result<()> {
        if self.state != AuthState::SessionEstablished {
            return Err(self.fail("login attempted before the session was opened"));
        }

        let url = endpoint(&self.base_url, LOGIN_PATH);
        let response = match self.session.post_form(&url, &credentials.login_form()).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(&e.to_string())),
        };

        if let Err(reason) = check_login_response(response.status, response.location()) {
            return Err(self.fail(&reason));
        }

        self.log.debug("Login accepted");
        self.state = AuthState::Authenticated;
        Ok(())
    }

    /// Re-fetch home, then fetch the bills page and return its markup
    pub async fn fetch_bills_page(&mut self) -> Result<String> {
        if self.state != AuthState::Authenticated {
            return Err(self.fail("bills requested without an authenticated session"));
        }

        let home = endpoint(&self.base_url, HOME_PATH);
        if let Err(e) = self.session.get(&home).await {
            return Err(self.fail(&format!("home page after login: {}", e)));
        }

        let bills = endpoint(&self.base_url, BILLS_PATH);
        let response = match self.session.get(&bills).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(&format!("bills page: {}", e))),
        };

        if !response.status.is_success() {
            self.log.warning(&format!(
                "Bills page answered HTTP {}",
                response.status.as_u16()
            ));
        }

        self.state = AuthState::BillsFetched;
        Ok(response.body)
    }

    /// Full sequence: open session, log in, fetch the bills page
    pub async fn fetch_bill_markup(&mut self, credentials: &Credentials) -> Result<String> {
        self.open_session().await?;
        self.log_in(credentials).await?;
        self.fetch_bills_page().await
    }
}
