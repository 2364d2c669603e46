use async_trait::async_trait;
use reqwest::Method;

use super::error::ApplianceError;
use super::session::{Session, check_status};
use super::types::{
    ServerTemplate, ServerTemplateBody, TemplateAttach, TemplateAttachBody, VirtualServer,
    VirtualServerList, VirtualServerTemplate, VirtualServerTemplateBody,
};

/// SLB operations the reconciliation core depends on.
///
/// [`Session`] implements this against the live appliance; tests substitute
/// a scripted backend so create/update branching runs offline.
#[async_trait]
pub trait SlbApi {
    /// Names of every virtual server configured on the appliance.
    async fn virtual_server_names(&self) -> Result<Vec<String>, ApplianceError>;

    /// Probe for a `server` template. `None` means the appliance does not
    /// have the object.
    async fn get_server_template(&self, name: &str) -> Result<Option<String>, ApplianceError>;

    async fn create_server_template(
        &self,
        template: &ServerTemplate,
    ) -> Result<(), ApplianceError>;

    async fn update_server_template(
        &self,
        template: &ServerTemplate,
    ) -> Result<(), ApplianceError>;

    /// Probe for a `virtual-server` template. `None` means absent.
    async fn get_virtual_server_template(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApplianceError>;

    async fn create_virtual_server_template(
        &self,
        template: &VirtualServerTemplate,
    ) -> Result<(), ApplianceError>;

    async fn update_virtual_server_template(
        &self,
        template: &VirtualServerTemplate,
    ) -> Result<(), ApplianceError>;

    /// Merge a template reference onto an existing virtual server. POST
    /// keeps the virtual server's other fields; a PUT would replace them.
    async fn attach_virtual_server_template(
        &self,
        virtual_server: &str,
        template: &str,
    ) -> Result<(), ApplianceError>;
}

impl Session {
    /// Full virtual-server list with addresses and ports.
    pub async fn virtual_servers(&self) -> Result<Vec<VirtualServer>, ApplianceError> {
        let body = self
            .call("/slb/virtual-server-list", Method::GET, None)
            .await?;
        check_status(&body)?;

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: VirtualServerList = serde_json::from_str(&body)?;
        Ok(list.virtual_servers)
    }
}

#[async_trait]
impl SlbApi for Session {
    async fn virtual_server_names(&self) -> Result<Vec<String>, ApplianceError> {
        Ok(self
            .virtual_servers()
            .await?
            .into_iter()
            .map(|vs| vs.name)
            .collect())
    }

    async fn get_server_template(&self, name: &str) -> Result<Option<String>, ApplianceError> {
        let body = self
            .call(&format!("/slb/template/server/{name}"), Method::GET, None)
            .await?;
        probe_result(body)
    }

    async fn create_server_template(
        &self,
        template: &ServerTemplate,
    ) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&ServerTemplateBody {
            server: template.clone(),
        })?;
        let body = self
            .call("/slb/template/server", Method::POST, Some(payload))
            .await?;
        check_status(&body)
    }

    async fn update_server_template(
        &self,
        template: &ServerTemplate,
    ) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&ServerTemplateBody {
            server: template.clone(),
        })?;
        let body = self
            .call("/slb/template/server", Method::PUT, Some(payload))
            .await?;
        check_status(&body)
    }

    async fn get_virtual_server_template(
        &self,
        name: &str,
    ) -> Result<Option<String>, ApplianceError> {
        let body = self
            .call(
                &format!("/slb/template/virtual-server/{name}"),
                Method::GET,
                None,
            )
            .await?;
        probe_result(body)
    }

    async fn create_virtual_server_template(
        &self,
        template: &VirtualServerTemplate,
    ) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&VirtualServerTemplateBody {
            virtual_server: template.clone(),
        })?;
        let body = self
            .call("/slb/template/virtual-server", Method::POST, Some(payload))
            .await?;
        check_status(&body)
    }

    async fn update_virtual_server_template(
        &self,
        template: &VirtualServerTemplate,
    ) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&VirtualServerTemplateBody {
            virtual_server: template.clone(),
        })?;
        let body = self
            .call("/slb/template/virtual-server", Method::PUT, Some(payload))
            .await?;
        check_status(&body)
    }

    async fn attach_virtual_server_template(
        &self,
        virtual_server: &str,
        template: &str,
    ) -> Result<(), ApplianceError> {
        let payload = serde_json::to_string(&TemplateAttachBody {
            virtual_server: TemplateAttach {
                template_virtual_server: template.to_string(),
            },
        })?;
        let body = self
            .call(
                &format!("/slb/virtual-server/{virtual_server}"),
                Method::POST,
                Some(payload),
            )
            .await?;
        check_status(&body)
    }
}

/// Map a probe response to object presence.
///
/// The appliance answers a probe for an unknown object with a failure
/// envelope on an HTTP 200; for existence checks that simply means
/// "absent", as does an empty body. Transport errors propagate.
fn probe_result(body: String) -> Result<Option<String>, ApplianceError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    match check_status(&body) {
        Ok(()) => Ok(Some(body)),
        Err(ApplianceError::Remote(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
