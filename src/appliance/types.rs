use serde::{Deserialize, Serialize};

/// Login request body for the `/auth` endpoint.
#[derive(Debug, Serialize)]
pub struct AuthRequest {
    pub credentials: Credentials,
}

#[derive(Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful `/auth` response.
#[derive(Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub authresponse: AuthSignature,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthSignature {
    #[serde(default)]
    pub signature: String,
}

/// `slb template server` payload carrying bandwidth rate limits.
///
/// Field names follow the appliance schema, so serialization is the wire
/// format directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerTemplate {
    pub name: String,

    #[serde(rename = "bw-rate-limit")]
    pub bw_rate_limit: u64,

    #[serde(rename = "bw-rate-limit-resume")]
    pub bw_rate_limit_resume: u64,

    #[serde(rename = "bw-rate-limit-duration")]
    pub bw_rate_limit_duration: u64,
}

#[derive(Debug, Serialize)]
pub struct ServerTemplateBody {
    pub server: ServerTemplate,
}

/// `slb template virtual-server` payload carrying connection rate limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualServerTemplate {
    pub name: String,

    #[serde(rename = "conn-limit")]
    pub conn_limit: u64,

    #[serde(rename = "conn-rate-limit")]
    pub conn_rate_limit: u64,
}

#[derive(Debug, Serialize)]
pub struct VirtualServerTemplateBody {
    #[serde(rename = "virtual-server")]
    pub virtual_server: VirtualServerTemplate,
}

/// Partial update attaching a virtual-server template by name. POSTed to
/// the virtual server so its other fields are merged, not replaced.
#[derive(Debug, Serialize)]
pub struct TemplateAttachBody {
    #[serde(rename = "virtual-server")]
    pub virtual_server: TemplateAttach,
}

#[derive(Debug, Serialize)]
pub struct TemplateAttach {
    #[serde(rename = "template-virtual-server")]
    pub template_virtual_server: String,
}

/// One entry of `/slb/virtual-server-list`.
#[derive(Debug, Clone, Deserialize)]
pub struct VirtualServer {
    pub name: String,

    #[serde(rename = "ip-address", default)]
    pub ip_address: String,

    #[serde(rename = "port-list", default)]
    pub ports: Vec<VirtualServerPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualServerPort {
    #[serde(rename = "port-number")]
    pub port_number: u16,

    #[serde(default)]
    pub protocol: String,

    #[serde(rename = "service-group", default)]
    pub service_group: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VirtualServerList {
    #[serde(rename = "virtual-server-list", default)]
    pub virtual_servers: Vec<VirtualServer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_template_serializes_wire_field_names() {
        let body = ServerTemplateBody {
            server: ServerTemplate {
                name: "opa-policy-bw".to_string(),
                bw_rate_limit: 1000,
                bw_rate_limit_resume: 800,
                bw_rate_limit_duration: 20,
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["server"]["name"], "opa-policy-bw");
        assert_eq!(value["server"]["bw-rate-limit"], 1000);
        assert_eq!(value["server"]["bw-rate-limit-resume"], 800);
        assert_eq!(value["server"]["bw-rate-limit-duration"], 20);
    }

    #[test]
    fn virtual_server_template_serializes_wire_field_names() {
        let body = VirtualServerTemplateBody {
            virtual_server: VirtualServerTemplate {
                name: "opa-policy-cps".to_string(),
                conn_limit: 100,
                conn_rate_limit: 100,
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["virtual-server"]["name"], "opa-policy-cps");
        assert_eq!(value["virtual-server"]["conn-limit"], 100);
        assert_eq!(value["virtual-server"]["conn-rate-limit"], 100);
    }

    #[test]
    fn template_attach_is_a_bare_reference() {
        let body = TemplateAttachBody {
            virtual_server: TemplateAttach {
                template_virtual_server: "opa-policy-cps".to_string(),
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["virtual-server"]["template-virtual-server"],
            "opa-policy-cps"
        );
        // A partial update must not carry other fields.
        assert_eq!(value["virtual-server"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn template_names_with_special_characters_stay_quoted() {
        let body = VirtualServerTemplateBody {
            virtual_server: VirtualServerTemplate {
                name: "limit \"a\"\\b".to_string(),
                conn_limit: 1,
                conn_rate_limit: 1,
            },
        };

        let text = serde_json::to_string(&body).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["virtual-server"]["name"], "limit \"a\"\\b");
    }

    #[test]
    fn virtual_server_list_deserializes() {
        let body = r#"{
            "virtual-server-list": [
                {
                    "name": "ws-vip",
                    "ip-address": "10.1.1.44",
                    "port-list": [
                        {"port-number": 80, "protocol": "http", "service-group": "ws-sg"}
                    ]
                },
                {"name": "bare-vip"}
            ]
        }"#;

        let list: VirtualServerList = serde_json::from_str(body).unwrap();
        assert_eq!(list.virtual_servers.len(), 2);
        assert_eq!(list.virtual_servers[0].name, "ws-vip");
        assert_eq!(list.virtual_servers[0].ports[0].port_number, 80);
        assert_eq!(list.virtual_servers[0].ports[0].service_group, "ws-sg");
        assert!(list.virtual_servers[1].ports.is_empty());
    }

    #[test]
    fn auth_response_tolerates_missing_fields() {
        let parsed: AuthResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.authresponse.signature.is_empty());

        let parsed: AuthResponse =
            serde_json::from_str(r#"{"authresponse": {"signature": "abc123"}}"#).unwrap();
        assert_eq!(parsed.authresponse.signature, "abc123");
    }
}
