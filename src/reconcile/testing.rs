// Shared test doubles for the reconciliation core.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::appliance::error::ApplianceError;
use crate::appliance::slb::SlbApi;
use crate::appliance::types::{ServerTemplate, VirtualServerTemplate};
use crate::policy::opa::PolicySource;

/// Every remote operation a test run can observe.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MockCall {
    ListVirtualServers,
    ProbeServerTemplate(String),
    CreateServerTemplate(ServerTemplate),
    UpdateServerTemplate(ServerTemplate),
    ProbeVirtualServerTemplate(String),
    CreateVirtualServerTemplate(VirtualServerTemplate),
    UpdateVirtualServerTemplate(VirtualServerTemplate),
    Attach {
        virtual_server: String,
        template: String,
    },
}

impl MockCall {
    pub(crate) fn is_write(&self) -> bool {
        !matches!(
            self,
            MockCall::ListVirtualServers
                | MockCall::ProbeServerTemplate(_)
                | MockCall::ProbeVirtualServerTemplate(_)
        )
    }
}

#[derive(Debug, Default)]
struct MockState {
    server_templates: HashSet<String>,
    virtual_server_templates: HashSet<String>,
    calls: Vec<MockCall>,
}

/// Scripted in-memory appliance backend recording every call.
///
/// Successful creates register the template so a later probe sees it.
#[derive(Debug, Default)]
pub(crate) struct MockSlb {
    pub(crate) virtual_servers: Vec<String>,
    /// Fail the virtual-server listing with a transport error.
    pub(crate) fail_listing: bool,
    /// Fail every create with a remote "already exists" envelope.
    pub(crate) fail_creates: bool,
    state: Mutex<MockState>,
}

impl MockSlb {
    pub(crate) fn with_virtual_servers(names: &[&str]) -> Self {
        Self {
            virtual_servers: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn seed_server_template(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .server_templates
            .insert(name.to_string());
    }

    pub(crate) fn seed_virtual_server_template(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .virtual_server_templates
            .insert(name.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_write()).count()
    }

    fn record(&self, call: MockCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl SlbApi for MockSlb {
    async fn virtual_server_names(&self) -> Result<Vec<String>, ApplianceError> {
        self.record(MockCall::ListVirtualServers);
        if self.fail_listing {
            return Err(ApplianceError::Transport(
                "503 Service Unavailable".to_string(),
            ));
        }
        Ok(self.virtual_servers.clone())
    }

    async fn get_server_template(&self, name: &str) -> Result<Option<String>, ApplianceError> {
        self.record(MockCall::ProbeServerTemplate(name.to_string()));
        let present = self.state.lock().unwrap().server_templates.contains(name);
        Ok(present.then(|| format!(r#"{{"server": {{"name": "{name}"}}}}"#)))
    }

    async fn create_server_template(
        &self,
        template: &ServerTemplate,
    ) -> Result<(), ApplianceError> {
        self.record(MockCall::CreateServerTemplate(template.clone()));
        if self.fail_creates {
            return Err(ApplianceError::Remote("Object Already Exist".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .server_templates
            .insert(template.name.clone());
        Ok(())
    }

    async fn update_server_template(
        &self,
        template: &ServerTemplate,
    ) -> Result<(), ApplianceError> {
        self.record(MockCall::UpdateServerTemplate(template.clone()));
        Ok(())
    }

    async fn get_virtual_server_template(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApplianceError> {
        self.record(MockCall::ProbeVirtualServerTemplate(name.to_string()));
        let present = self
            .state
            .lock()
            .unwrap()
            .virtual_server_templates
            .contains(name);
        Ok(present.then(|| format!(r#"{{"virtual-server": {{"name": "{name}"}}}}"#)))
    }

    async fn create_virtual_server_template(
        &self,
        template: &VirtualServerTemplate,
    ) -> Result<(), ApplianceError> {
        self.record(MockCall::CreateVirtualServerTemplate(template.clone()));
        if self.fail_creates {
            return Err(ApplianceError::Remote("Object Already Exist".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .virtual_server_templates
            .insert(template.name.clone());
        Ok(())
    }

    async fn update_virtual_server_template(
        &self,
        template: &VirtualServerTemplate,
    ) -> Result<(), ApplianceError> {
        self.record(MockCall::UpdateVirtualServerTemplate(template.clone()));
        Ok(())
    }

    async fn attach_virtual_server_template(
        &self,
        virtual_server: &str,
        template: &str,
    ) -> Result<(), ApplianceError> {
        self.record(MockCall::Attach {
            virtual_server: virtual_server.to_string(),
            template: template.to_string(),
        });
        Ok(())
    }
}

/// `PolicySource` backed by a fixed full-document response, navigating
/// `/net/...` paths the way the data API would.
pub(crate) struct FixtureSource(pub(crate) Value);

#[async_trait]
impl PolicySource for FixtureSource {
    async fn fetch(&self, path: &str) -> Result<Value> {
        if path.is_empty() {
            return Ok(self.0.clone());
        }
        let value = self
            .0
            .pointer(&format!("/result{path}"))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(json!({ "result": value }))
    }
}
