use thiserror::Error;

/// Errors surfaced by the appliance REST client.
///
/// Transport problems and remote-side semantic failures are distinct
/// variants: the appliance answers HTTP 200 for conditions like "object
/// already exists" and flags them in the response envelope instead.
#[derive(Debug, Error)]
pub enum ApplianceError {
    /// An API call was attempted before a login produced a token.
    #[error("no session token: login must succeed before other API calls")]
    NotAuthenticated,

    /// Login completed at the HTTP layer but yielded no usable token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-2xx HTTP status from the appliance; carries the status text.
    /// The response body is not parsed in this case.
    #[error("transport error: {0}")]
    Transport(String),

    /// The appliance accepted the request but reported failure in the
    /// response envelope (`response.status == "fail"`).
    #[error("appliance error: {0}")]
    Remote(String),

    /// Connection-level failure before any HTTP status was received.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A request payload or response body that should be JSON was not.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_and_transport_are_distinct() {
        let remote = ApplianceError::Remote("Object Already Exist".to_string());
        let transport = ApplianceError::Transport("500 Internal Server Error".to_string());

        assert!(matches!(remote, ApplianceError::Remote(_)));
        assert!(matches!(transport, ApplianceError::Transport(_)));
        assert!(remote.to_string().contains("Object Already Exist"));
        assert!(transport.to_string().contains("500"));
    }
}
