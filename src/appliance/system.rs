use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::error::ApplianceError;
use super::session::{CLI_DEPLOY_PATH, Session, check_status, json_string};

/// Operational software/platform details reported by the appliance.
#[derive(Debug, Clone, Default)]
pub struct VersionInfo {
    pub software_version: String,
    pub hardware_platform: String,
    pub boot_from: String,
    pub serial_number: String,
    pub up_time: String,
}

#[derive(Debug, Serialize)]
struct HostnameBody {
    hostname: HostnameValue,
}

#[derive(Debug, Serialize)]
struct HostnameValue {
    value: String,
}

impl Session {
    /// Version, platform and uptime details from `/version/oper`.
    pub async fn version_info(&self) -> Result<VersionInfo, ApplianceError> {
        let body = self.call("/version/oper", Method::GET, None).await?;
        check_status(&body)?;

        let doc: Value = serde_json::from_str(&body)?;
        Ok(VersionInfo {
            software_version: json_string(&doc, "/version/oper/sw-version"),
            hardware_platform: json_string(&doc, "/version/oper/hw-platform"),
            boot_from: json_string(&doc, "/version/oper/boot-from"),
            serial_number: json_string(&doc, "/version/oper/serial-number"),
            up_time: json_string(&doc, "/version/oper/up-time"),
        })
    }

    /// Appliance uptime as the device reports it.
    pub async fn uptime(&self) -> Result<String, ApplianceError> {
        Ok(self.version_info().await?.up_time)
    }

    /// Currently configured hostname.
    pub async fn hostname(&self) -> Result<String, ApplianceError> {
        let body = self.call("/hostname", Method::GET, None).await?;
        check_status(&body)?;

        let doc: Value = serde_json::from_str(&body)?;
        Ok(json_string(&doc, "/hostname/value"))
    }

    pub async fn set_hostname(&self, hostname: &str) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&HostnameBody {
            hostname: HostnameValue {
                value: hostname.to_string(),
            },
        })?;
        let body = self.call("/hostname", Method::PUT, Some(payload)).await?;
        check_status(&body)
    }

    /// Run CLI commands through the control-command endpoint.
    ///
    /// Successful deployments come back as plain text. A JSON body from
    /// this endpoint is either a failure envelope or an unexpected shape;
    /// both are recoverable errors for the caller.
    pub async fn cli_deploy(&self, commands: &str) -> Result<String, ApplianceError> {
        let body = self
            .call(CLI_DEPLOY_PATH, Method::POST, Some(commands.to_string()))
            .await?;
        classify_cli_response(body)
    }
}

fn classify_cli_response(body: String) -> Result<String, ApplianceError> {
    if serde_json::from_str::<Value>(&body).is_err() {
        return Ok(body);
    }
    check_status(&body)?;
    Err(ApplianceError::Remote(format!(
        "unexpected JSON response from {CLI_DEPLOY_PATH}: {body}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_response_plain_text_is_success() {
        let out = classify_cli_response("interface ethernet 1\n  enable\n!\n".to_string());
        assert_eq!(out.unwrap(), "interface ethernet 1\n  enable\n!\n");
    }

    #[test]
    fn cli_response_failure_envelope_is_remote_error() {
        let body = r#"{"response": {"status": "fail", "err": {"msg": "bad command"}}}"#;
        let err = classify_cli_response(body.to_string()).unwrap_err();
        assert!(matches!(err, ApplianceError::Remote(msg) if msg == "bad command"));
    }

    #[test]
    fn cli_response_unexpected_json_is_recoverable() {
        let err = classify_cli_response(r#"{"something": "else"}"#.to_string()).unwrap_err();
        assert!(matches!(err, ApplianceError::Remote(_)));
    }

    #[test]
    fn hostname_payload_shape() {
        let payload = HostnameBody {
            hostname: HostnameValue {
                value: "lb-east-1".to_string(),
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["hostname"]["value"], "lb-east-1");
    }
}
