use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::error::ApplianceError;
use super::session::{Session, check_status, json_string};

/// DNS resolver settings configured on the appliance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsSettings {
    pub primary_ipv4: String,
    pub primary_ipv6: String,
    pub secondary_ipv4: String,
    pub secondary_ipv6: String,
    pub suffix: String,
}

/// State of one ethernet data interface.
#[derive(Debug, Clone, Default)]
pub struct InterfaceInfo {
    pub ifnum: u32,
    pub status: String,
    pub mtu: u64,
    pub ipv4_address: String,
    pub ipv4_netmask: String,
}

#[derive(Debug, Serialize)]
struct PrimaryDnsBody<'a> {
    primary: DnsServer<'a>,
}

#[derive(Debug, Serialize)]
struct SecondaryDnsBody<'a> {
    secondary: DnsServer<'a>,
}

#[derive(Debug, Serialize)]
struct DnsServer<'a> {
    #[serde(rename = "ip-v4-addr")]
    ip_v4_addr: &'a str,
}

#[derive(Debug, Serialize)]
struct DnsSuffixBody<'a> {
    suffix: DnsSuffix<'a>,
}

#[derive(Debug, Serialize)]
struct DnsSuffix<'a> {
    #[serde(rename = "domain-name")]
    domain_name: &'a str,
}

#[derive(Debug, Serialize)]
struct InterfaceActionBody {
    ethernet: InterfaceAction,
}

#[derive(Debug, Serialize)]
struct InterfaceAction {
    ifnum: u32,
    action: &'static str,
}

impl InterfaceActionBody {
    fn new(ifnum: u32, enabled: bool) -> Self {
        Self {
            ethernet: InterfaceAction {
                ifnum,
                action: if enabled { "enable" } else { "disable" },
            },
        }
    }
}

impl Session {
    /// All DNS settings in one read.
    pub async fn dns_settings(&self) -> Result<DnsSettings, ApplianceError> {
        let body = self.call("/ip/dns?detail=true", Method::GET, None).await?;
        check_status(&body)?;

        let doc: Value = serde_json::from_str(&body)?;
        Ok(DnsSettings {
            primary_ipv4: json_string(&doc, "/dns/primary/ip-v4-addr"),
            primary_ipv6: json_string(&doc, "/dns/primary/ip-v6-addr"),
            secondary_ipv4: json_string(&doc, "/dns/secondary/ip-v4-addr"),
            secondary_ipv6: json_string(&doc, "/dns/secondary/ip-v6-addr"),
            suffix: json_string(&doc, "/dns/suffix/domain-name"),
        })
    }

    pub async fn set_primary_dns(&self, addr: &str) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&PrimaryDnsBody {
            primary: DnsServer { ip_v4_addr: addr },
        })?;
        let body = self
            .call("/ip/dns/primary", Method::POST, Some(payload))
            .await?;
        check_status(&body)
    }

    pub async fn set_secondary_dns(&self, addr: &str) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&SecondaryDnsBody {
            secondary: DnsServer { ip_v4_addr: addr },
        })?;
        let body = self
            .call("/ip/dns/secondary", Method::POST, Some(payload))
            .await?;
        check_status(&body)
    }

    pub async fn set_dns_suffix(&self, suffix: &str) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&DnsSuffixBody {
            suffix: DnsSuffix {
                domain_name: suffix,
            },
        })?;
        let body = self
            .call("/ip/dns/suffix", Method::POST, Some(payload))
            .await?;
        check_status(&body)
    }

    /// Read one ethernet interface's configuration.
    pub async fn interface_info(&self, ifnum: u32) -> Result<InterfaceInfo, ApplianceError> {
        let body = self
            .call(&format!("/interface/ethernet/{ifnum}"), Method::GET, None)
            .await?;
        check_status(&body)?;

        let doc: Value = serde_json::from_str(&body)?;
        Ok(InterfaceInfo {
            ifnum,
            status: json_string(&doc, "/ethernet/action"),
            mtu: doc
                .pointer("/ethernet/mtu")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
            ipv4_address: json_string(&doc, "/ethernet/ip/address-list/0/ipv4-address"),
            ipv4_netmask: json_string(&doc, "/ethernet/ip/address-list/0/ipv4-netmask"),
        })
    }

    /// Enable or disable an ethernet interface; returns the action the
    /// appliance reports back.
    pub async fn set_interface_enabled(
        &self,
        ifnum: u32,
        enabled: bool,
    ) -> Result<String, ApplianceError> {
        let payload = serde_json::to_string(&InterfaceActionBody::new(ifnum, enabled))?;
        let body = self
            .call(
                &format!("/interface/ethernet/{ifnum}"),
                Method::POST,
                Some(payload),
            )
            .await?;
        check_status(&body)?;

        let doc: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        Ok(json_string(&doc, "/ethernet/action"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_action_body_shape() {
        let enable = serde_json::to_value(InterfaceActionBody::new(3, true)).unwrap();
        assert_eq!(enable["ethernet"]["ifnum"], 3);
        assert_eq!(enable["ethernet"]["action"], "enable");

        let disable = serde_json::to_value(InterfaceActionBody::new(3, false)).unwrap();
        assert_eq!(disable["ethernet"]["action"], "disable");
    }

    #[test]
    fn dns_payload_shapes() {
        let primary = serde_json::to_value(PrimaryDnsBody {
            primary: DnsServer {
                ip_v4_addr: "8.8.8.8",
            },
        })
        .unwrap();
        assert_eq!(primary["primary"]["ip-v4-addr"], "8.8.8.8");

        let suffix = serde_json::to_value(DnsSuffixBody {
            suffix: DnsSuffix {
                domain_name: "corp.example",
            },
        })
        .unwrap();
        assert_eq!(suffix["suffix"]["domain-name"], "corp.example");
    }
}
