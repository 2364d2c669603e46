use anyhow::Result;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use super::adapter;
use crate::appliance::slb::SlbApi;
use crate::config::{Config, ManagedVirtualServer, PolicyKind};
use crate::policy::opa::PolicySource;
use crate::policy::rules;

/// Drives validate-then-apply passes over the configured rules.
///
/// Holds no state between passes: every tick re-reads the policy source and
/// the appliance, so writes reverted externally heal on the next pass. Rules
/// are independent and best-effort; a failing rule is logged and the rest of
/// the pass continues.
pub struct Reconciler<A, P> {
    pub(crate) api: A,
    pub(crate) policy: P,
    pub(crate) config: Config,
}

impl<A, P> Reconciler<A, P>
where
    A: SlbApi + Sync,
    P: PolicySource + Sync,
{
    pub fn new(api: A, policy: P, config: Config) -> Self {
        Self {
            api,
            policy,
            config,
        }
    }

    /// Run passes forever: one immediately, then one per tick.
    ///
    /// A single sequential worker: a pass that overruns the interval delays
    /// the next tick instead of overlapping with it.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.check_interval);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            self.run_pass().await;

            let next = chrono::Local::now() + chrono::Duration::seconds(interval.as_secs() as i64);
            tracing::debug!(
                "Next reconciliation pass at ~{}",
                next.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    /// One full pass: warn about configured virtual servers the appliance
    /// does not know, then apply every rule.
    pub async fn run_pass(&self) {
        self.validate_targets().await;
        self.apply_rules().await;
    }

    /// Validating phase. Absence of a configured virtual server is a
    /// warning, never fatal: its rules are still attempted afterwards.
    async fn validate_targets(&self) {
        let names = match self.api.virtual_server_names().await {
            Ok(names) => names,
            Err(err) => {
                tracing::error!("Failed to list virtual servers: {err}");
                return;
            }
        };

        for vs in &self.config.virtual_servers {
            if !names.iter().any(|name| name == &vs.name) {
                tracing::warn!("Virtual server '{}' not found on appliance", vs.name);
            }
        }
    }

    /// Applying phase. Each rule resolves and applies on its own; failures
    /// abandon that rule for this cycle only.
    async fn apply_rules(&self) {
        for vs in &self.config.virtual_servers {
            if let Err(err) = self.apply_rule(vs).await {
                tracing::error!(
                    "Failed to apply {} policy for '{}': {err:#}",
                    vs.policy.label(),
                    vs.name
                );
            }
        }
    }

    async fn apply_rule(&self, vs: &ManagedVirtualServer) -> Result<()> {
        let device_id = &self.config.appliance.device_id;
        let Some(rule) = rules::resolve_rule(&self.policy, vs.policy, device_id).await? else {
            // resolve_rule already warned about the missing step.
            return Ok(());
        };

        tracing::debug!(
            "Resolved {} rule for '{}': tier '{}', rate {}",
            vs.policy.label(),
            vs.name,
            rule.tier,
            rule.rate
        );

        match vs.policy {
            PolicyKind::Bandwidth => adapter::ensure_bandwidth_template(&self.api, rule.rate).await?,
            PolicyKind::ConnectionRate => {
                adapter::ensure_connection_rate_template(&self.api, &vs.name, rule.rate).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::testing::{FixtureSource, MockCall, MockSlb};
    use serde_json::json;

    fn test_config(virtual_servers: Vec<ManagedVirtualServer>) -> Config {
        serde_yaml::from_str::<Config>(
            "policy_source:\n  host: opa\nappliance:\n  host: lb\n  device_id: thunder-1\n",
        )
        .map(|mut config| {
            config.virtual_servers = virtual_servers;
            config
        })
        .unwrap()
    }

    fn sample_policy() -> FixtureSource {
        FixtureSource(json!({
            "result": {
                "net": {
                    "bw": {"orange": ["10"]},
                    "bwnodes": {"thunder-1": ["orange"]},
                    "cps": {"orange": ["100"]},
                    "cpsnodes": {"thunder-1": ["orange"]}
                }
            }
        }))
    }

    #[tokio::test]
    async fn pass_with_no_rules_validates_but_writes_nothing() {
        let api = MockSlb::with_virtual_servers(&["ws-vip"]);
        let reconciler = Reconciler::new(api, sample_policy(), test_config(vec![]));

        reconciler.run_pass().await;

        assert_eq!(
            reconciler.api.calls(),
            vec![MockCall::ListVirtualServers]
        );
        assert_eq!(reconciler.api.write_count(), 0);
    }

    #[tokio::test]
    async fn connection_rate_rule_creates_and_attaches_end_to_end() {
        let api = MockSlb::with_virtual_servers(&["ws-vip"]);
        let config = test_config(vec![ManagedVirtualServer {
            name: "ws-vip".to_string(),
            policy: PolicyKind::ConnectionRate,
        }]);
        let reconciler = Reconciler::new(api, sample_policy(), config);

        reconciler.run_pass().await;

        let calls = reconciler.api.calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            MockCall::CreateVirtualServerTemplate(t)
                if t.name == "opa-policy-cps" && t.conn_limit == 100 && t.conn_rate_limit == 100
        )));
        assert!(calls.iter().any(|c| matches!(
            c,
            MockCall::Attach { virtual_server, template }
                if virtual_server == "ws-vip" && template == "opa-policy-cps"
        )));
    }

    #[tokio::test]
    async fn missing_virtual_server_does_not_block_applying() {
        // "ghost-vip" is configured but absent from the appliance; its rule
        // still resolves and applies.
        let api = MockSlb::with_virtual_servers(&["other-vip"]);
        let config = test_config(vec![ManagedVirtualServer {
            name: "ghost-vip".to_string(),
            policy: PolicyKind::ConnectionRate,
        }]);
        let reconciler = Reconciler::new(api, sample_policy(), config);

        reconciler.run_pass().await;

        assert!(reconciler.api.write_count() > 0);
    }

    #[tokio::test]
    async fn listing_failure_skips_validation_but_not_applying() {
        let mut api = MockSlb::with_virtual_servers(&["ws-vip"]);
        api.fail_listing = true;
        let config = test_config(vec![ManagedVirtualServer {
            name: "ws-vip".to_string(),
            policy: PolicyKind::Bandwidth,
        }]);
        let reconciler = Reconciler::new(api, sample_policy(), config);

        reconciler.run_pass().await;

        assert!(reconciler.api.calls().iter().any(|c| matches!(
            c,
            MockCall::CreateServerTemplate(t) if t.bw_rate_limit == 10
        )));
    }

    #[tokio::test]
    async fn failing_rule_does_not_stop_the_rest_of_the_pass() {
        let mut api = MockSlb::with_virtual_servers(&["ws-vip", "ws-vip2"]);
        api.fail_creates = true;
        let config = test_config(vec![
            ManagedVirtualServer {
                name: "ws-vip".to_string(),
                policy: PolicyKind::ConnectionRate,
            },
            ManagedVirtualServer {
                name: "ws-vip2".to_string(),
                policy: PolicyKind::Bandwidth,
            },
        ]);
        let reconciler = Reconciler::new(api, sample_policy(), config);

        reconciler.run_pass().await;

        // Both rules were attempted even though every create failed.
        let calls = reconciler.api.calls();
        assert!(calls
            .iter()
            .any(|c| matches!(c, MockCall::CreateVirtualServerTemplate(_))));
        assert!(calls
            .iter()
            .any(|c| matches!(c, MockCall::CreateServerTemplate(_))));
    }

    #[tokio::test]
    async fn unresolved_rule_is_skipped_without_writes() {
        let api = MockSlb::with_virtual_servers(&["ws-vip"]);
        let policy = FixtureSource(json!({"result": {"net": {}}}));
        let config = test_config(vec![ManagedVirtualServer {
            name: "ws-vip".to_string(),
            policy: PolicyKind::ConnectionRate,
        }]);
        let reconciler = Reconciler::new(api, policy, config);

        reconciler.run_pass().await;

        assert_eq!(reconciler.api.write_count(), 0);
    }

    #[tokio::test]
    async fn bandwidth_pass_twice_creates_once_then_updates() {
        let api = MockSlb::with_virtual_servers(&["ws-vip2"]);
        let config = test_config(vec![ManagedVirtualServer {
            name: "ws-vip2".to_string(),
            policy: PolicyKind::Bandwidth,
        }]);
        let reconciler = Reconciler::new(api, sample_policy(), config);

        reconciler.run_pass().await;
        reconciler.run_pass().await;

        let creates = reconciler
            .api
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::CreateServerTemplate(_)))
            .count();
        let updates = reconciler
            .api
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::UpdateServerTemplate(_)))
            .count();
        assert_eq!((creates, updates), (1, 1));
    }
}
