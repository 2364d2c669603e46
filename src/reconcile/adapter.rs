use crate::appliance::error::ApplianceError;
use crate::appliance::slb::SlbApi;
use crate::appliance::types::{ServerTemplate, VirtualServerTemplate};

/// Template realizing bandwidth policy on backend servers.
pub const BANDWIDTH_TEMPLATE: &str = "opa-policy-bw";
/// Template realizing connection-rate policy on a virtual server.
pub const CONNECTION_RATE_TEMPLATE: &str = "opa-policy-cps";

/// Fraction of the configured rate at which traffic resumes after a
/// throttle triggers. Policy constant, not configurable.
const RESUME_FACTOR: f64 = 0.8;
/// Seconds a throttle stays in force once triggered. Policy constant.
const THROTTLE_DURATION_SECS: u64 = 20;

/// Resume threshold derived from a bandwidth rate: 80% of the limit,
/// truncated toward zero.
pub fn resume_rate(rate: u64) -> u64 {
    (rate as f64 * RESUME_FACTOR) as u64
}

/// Make the bandwidth template carry the given rate.
///
/// The appliance has no upsert verb, so existence is probed first: create
/// when absent, update when present. Not transactional; a concurrent
/// external change between probe and write is not detected.
pub async fn ensure_bandwidth_template<S: SlbApi + Sync>(
    api: &S,
    rate: u64,
) -> Result<(), ApplianceError> {
    let template = ServerTemplate {
        name: BANDWIDTH_TEMPLATE.to_string(),
        bw_rate_limit: rate,
        bw_rate_limit_resume: resume_rate(rate),
        bw_rate_limit_duration: THROTTLE_DURATION_SECS,
    };

    match api.get_server_template(BANDWIDTH_TEMPLATE).await? {
        None => {
            tracing::info!("Creating bandwidth template '{BANDWIDTH_TEMPLATE}' (rate {rate})");
            api.create_server_template(&template).await
        }
        Some(_) => {
            tracing::info!("Updating bandwidth template '{BANDWIDTH_TEMPLATE}' (rate {rate})");
            api.update_server_template(&template).await
        }
    }
}

/// Make the connection-rate template carry the given rate and attach it to
/// the named virtual server.
///
/// Same probe/create/update sequence as the bandwidth path, followed by a
/// partial update merging the template reference onto the virtual server.
pub async fn ensure_connection_rate_template<S: SlbApi + Sync>(
    api: &S,
    virtual_server: &str,
    rate: u64,
) -> Result<(), ApplianceError> {
    let template = VirtualServerTemplate {
        name: CONNECTION_RATE_TEMPLATE.to_string(),
        conn_limit: rate,
        conn_rate_limit: rate,
    };

    match api.get_virtual_server_template(CONNECTION_RATE_TEMPLATE).await? {
        None => {
            tracing::info!(
                "Creating connection-rate template '{CONNECTION_RATE_TEMPLATE}' (rate {rate})"
            );
            api.create_virtual_server_template(&template).await?;
        }
        Some(_) => {
            tracing::info!(
                "Updating connection-rate template '{CONNECTION_RATE_TEMPLATE}' (rate {rate})"
            );
            api.update_virtual_server_template(&template).await?;
        }
    }

    api.attach_virtual_server_template(virtual_server, CONNECTION_RATE_TEMPLATE)
        .await
}
