use anyhow::Result;
use serde_json::Value;

use super::opa::{PolicySource, first_result_string, first_result_u64};
use crate::config::PolicyKind;

/// A fully resolved rule for one managed node: the tier the node is
/// assigned to and the numeric rate that tier maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub node_id: String,
    pub tier: String,
    pub rate: u64,
}

// Document sections, per policy kind.
impl PolicyKind {
    /// Section mapping node ids to tier labels.
    pub fn node_section(self) -> &'static str {
        match self {
            PolicyKind::Bandwidth => "bwnodes",
            PolicyKind::ConnectionRate => "cpsnodes",
        }
    }

    /// Section holding tier -> rate entries.
    pub fn rate_section(self) -> &'static str {
        match self {
            PolicyKind::Bandwidth => "bw",
            PolicyKind::ConnectionRate => "cps",
        }
    }
}

/// Resolve the rate for `node_id` through the document's two-step
/// indirection: node id -> tier label -> numeric rate.
///
/// Returns `None` when either lookup comes back empty; the document may
/// legitimately omit a node or a tier. Nothing is cached, so every pass
/// sees the current document.
pub async fn resolve_rule<P: PolicySource + Sync>(
    source: &P,
    kind: PolicyKind,
    node_id: &str,
) -> Result<Option<PolicyRule>> {
    let nodes = source
        .fetch(&format!("/net/{}/{}", kind.node_section(), node_id))
        .await?;
    let Some(tier) = first_result_string(&nodes) else {
        tracing::warn!("No {} tier assigned to node '{node_id}'", kind.label());
        return Ok(None);
    };

    let rates = source
        .fetch(&format!("/net/{}/{}", kind.rate_section(), tier))
        .await?;
    let Some(rate) = first_result_u64(&rates) else {
        tracing::warn!("No rate defined for {} tier '{tier}'", kind.label());
        return Ok(None);
    };

    Ok(Some(PolicyRule {
        node_id: node_id.to_string(),
        tier,
        rate,
    }))
}

const NETWORK_SECTIONS: [(&str, &str); 4] = [
    ("bw", "Bandwidth tiers"),
    ("cps", "Connection-rate tiers"),
    ("bwnodes", "Node assignments for bandwidth policy"),
    ("cpsnodes", "Node assignments for connection-rate policy"),
];

/// Sections the agent relies on that are missing from a full document.
pub fn missing_network_sections(doc: &Value) -> Vec<&'static str> {
    NETWORK_SECTIONS
        .iter()
        .filter(|(section, _)| doc.pointer(&format!("/result/net/{section}")).is_none())
        .map(|(section, _)| *section)
        .collect()
}

/// Fetch the whole policy document and warn about absent network sections.
///
/// Missing sections are not fatal (the store may carry other policies this
/// agent does not use); only a failed fetch errors, which the caller treats
/// as a startup failure.
pub async fn check_network_sections<P: PolicySource + Sync>(source: &P) -> Result<()> {
    let doc = source.fetch("").await?;

    let missing = missing_network_sections(&doc);
    if missing.is_empty() {
        tracing::info!("Network policies found on policy source");
        return Ok(());
    }

    for (section, description) in NETWORK_SECTIONS {
        if missing.contains(&section) {
            tracing::warn!("{description} not found on policy source");
        }
    }
    Ok(())
}
