use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

use super::error::ApplianceError;
use super::types::{AuthRequest, AuthResponse, Credentials};

/// Path prefix shared by every appliance API endpoint.
const API_BASE: &str = "/api/v3";
/// Authentication endpoint; the only path callable without a token.
const AUTH_PATH: &str = "/auth";
/// The one endpoint that takes plain-text command input instead of JSON.
pub(crate) const CLI_DEPLOY_PATH: &str = "/clideploy";
/// Scheme prefix for the `Authorization` header.
const AUTH_SCHEME: &str = "A10";
/// Account substituted when no username is configured.
const DEFAULT_USERNAME: &str = "admin";
/// Factory password, paired only with the default account.
const DEFAULT_PASSWORD: &str = "a10";
/// Envelope status value marking a semantic failure.
const FAIL_STATUS: &str = "fail";
/// Envelope status value the logoff endpoint reports on success.
const LOGOFF_OK_STATUS: &str = "OK";

/// An authenticated session against one managed appliance.
///
/// Created by [`Session::login`]; the bearer token is attached to every
/// subsequent request and cleared again by [`Session::logoff`]. Cloning
/// shares the underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Session {
    address: String,
    token: String,
    client: Client,
}

impl Session {
    /// Exchange credentials for a session token.
    ///
    /// An empty username falls back to the appliance default account, and
    /// the factory password is substituted only when the username also
    /// resolved to that default.
    pub async fn login(
        address: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, ApplianceError> {
        let (username, password) = effective_credentials(username, password);

        let client = Client::builder()
            // Appliances commonly present self-signed certificates.
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        let mut session = Self {
            address: address.to_string(),
            token: String::new(),
            client,
        };

        let request = AuthRequest {
            credentials: Credentials { username, password },
        };
        let body = session
            .call(AUTH_PATH, Method::POST, Some(serde_json::to_string(&request)?))
            .await?;
        check_status(&body)?;

        let response: AuthResponse = serde_json::from_str(&body)?;
        if response.authresponse.signature.is_empty() {
            return Err(ApplianceError::Auth(
                "appliance returned an empty signature".to_string(),
            ));
        }

        session.token = format!("{AUTH_SCHEME} {}", response.authresponse.signature);
        Ok(session)
    }

    /// Invalidate the token server-side and clear it locally.
    ///
    /// The logoff endpoint reports success through an explicit `OK` status;
    /// anything else leaves the local token untouched and errors out.
    pub async fn logoff(&mut self) -> Result<(), ApplianceError> {
        let body = self.call("/logoff", Method::GET, None).await?;

        let doc: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let status = doc
            .pointer("/response/status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if status != LOGOFF_OK_STATUS {
            return Err(ApplianceError::Remote(format!(
                "invalid logoff, status {status:?}"
            )));
        }

        self.token.clear();
        Ok(())
    }

    /// Issue one request against `https://{address}/api/v3{path}`.
    ///
    /// Every path except the auth endpoint requires a token; calling
    /// without one fails before any network I/O. An HTTP status of 300 or
    /// above is a transport error carrying the status text, and the body is
    /// not read in that case.
    pub(crate) async fn call(
        &self,
        path: &str,
        method: Method,
        body: Option<String>,
    ) -> Result<String, ApplianceError> {
        if self.token.is_empty() && path != AUTH_PATH {
            return Err(ApplianceError::NotAuthenticated);
        }

        let url = format!("https://{}{}{}", self.address, API_BASE, path);
        let content_type = if path == CLI_DEPLOY_PATH {
            "text/plain"
        } else {
            "application/json"
        };

        let mut request = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, content_type);
        if !self.token.is_empty() {
            request = request.header(AUTHORIZATION, self.token.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(ApplianceError::Transport(status.to_string()));
        }

        Ok(response.text().await?)
    }

    /// Address this session was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether a login token is currently held.
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(address: &str, token: &str) -> Self {
        Self {
            address: address.to_string(),
            token: token.to_string(),
            client: Client::new(),
        }
    }
}

/// Inspect a response body for the failure envelope.
///
/// The status field is optional; when present and equal to the failure
/// sentinel, the accompanying message becomes the error cause. Applied
/// after every successful transport call, before any field extraction.
pub(crate) fn check_status(body: &str) -> Result<(), ApplianceError> {
    let Ok(doc) = serde_json::from_str::<Value>(body) else {
        return Ok(());
    };

    if let Some(status) = doc.pointer("/response/status").and_then(Value::as_str) {
        if status == FAIL_STATUS {
            let msg = doc
                .pointer("/response/err/msg")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(ApplianceError::Remote(msg.to_string()));
        }
    }

    Ok(())
}

/// String field lookup by JSON pointer; missing fields read as empty.
pub(crate) fn json_string(doc: &Value, pointer: &str) -> String {
    doc.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Apply the default-credential substitution rules.
fn effective_credentials(username: &str, password: &str) -> (String, String) {
    let username = if username.is_empty() {
        DEFAULT_USERNAME
    } else {
        username
    };
    let password = if password.is_empty() && username == DEFAULT_USERNAME {
        DEFAULT_PASSWORD
    } else {
        password
    };
    (username.to_string(), password.to_string())
}
