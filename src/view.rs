//! The templates view: one user session browsing a catalog and deploying from it.

use crate::access::{OwnershipService, UserDetails};
use crate::catalog::{self, CatalogError, CatalogKey, CatalogSource};
use crate::config::{EndpointConfig, PlatformSettings, SettingsProvider};
use crate::engine::{
    ContainerEngine, ContainerSummary, Network, NetworkScope, Result as EngineResult, VolumeInfo,
};
use crate::notify::Notifier;
use crate::pipeline::{
    ContainerPipeline, ContainerRequest, DeployError, DeploymentOutcome, ErrorKind, StackPipeline,
    StackRequest,
};
use crate::selection::{SelectionChange, SessionState};
use crate::stack::StackService;
use crate::template::{Template, TemplateType};
use crate::{DockyardError, log_info, log_warn};
use std::sync::Arc;

/// Services the view calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogSource>,
    pub engine: Arc<dyn ContainerEngine>,
    pub stacks: Arc<dyn StackService>,
    pub ownership: Arc<dyn OwnershipService>,
    pub settings: Arc<dyn SettingsProvider>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct TemplatesView {
    services: Collaborators,
    catalog_key: CatalogKey,
    endpoint: EndpointConfig,
    user: UserDetails,
    templates: Vec<Template>,
    available_categories: Vec<String>,
    available_networks: Vec<Network>,
    available_volumes: Vec<VolumeInfo>,
    running_containers: Vec<ContainerSummary>,
    allow_bind_mounts: bool,
    pub state: SessionState,
}

impl TemplatesView {
    /// Load everything the view needs. Any load failure is reported and leaves the view with
    /// no templates; the view itself stays usable.
    pub async fn init(
        services: Collaborators,
        catalog_key: CatalogKey,
        endpoint: EndpointConfig,
        user: UserDetails,
    ) -> Self {
        let mut state = SessionState::new();
        if catalog_key != CatalogKey::LinuxServerIo && endpoint.supports_stacks() {
            state.filters.template_type = TemplateType::Stack;
            state.show_deployment_selector = true;
        }

        let mut view = Self {
            services,
            catalog_key,
            endpoint,
            user,
            templates: Vec::new(),
            available_categories: Vec::new(),
            available_networks: Vec::new(),
            available_volumes: Vec::new(),
            running_containers: Vec::new(),
            allow_bind_mounts: false,
            state,
        };
        view.load().await;
        view
    }

    async fn load(&mut self) {
        let services = self.services.clone();
        let (templates, containers, volumes, networks, settings) = tokio::join!(
            services.catalog.get_templates(self.catalog_key),
            services.engine.list_containers(false),
            services.engine.list_volumes(),
            services.engine.list_networks(),
            services.settings.public_settings(),
        );

        let loaded = self.apply_loaded(templates, containers, volumes, networks, settings);

        match loaded {
            Ok(()) => log_info!(
                "Templates view ready: {} template(s), {} network(s)",
                self.templates.len(),
                self.available_networks.len()
            ),
            Err(e) => {
                self.templates.clear();
                self.services.notifier.error(
                    "Failure",
                    &e,
                    "An error occured during apps initialization.",
                );
            }
        }
    }

    fn apply_loaded(
        &mut self,
        templates: Result<Vec<Template>, CatalogError>,
        containers: EngineResult<Vec<ContainerSummary>>,
        volumes: EngineResult<Vec<VolumeInfo>>,
        networks: EngineResult<Vec<Network>>,
        settings: crate::Result<PlatformSettings>,
    ) -> crate::Result<()> {
        let templates = templates?;
        self.running_containers = containers?;
        self.available_volumes = volumes?;
        self.available_networks = self.offered_networks(networks?);
        self.allow_bind_mounts = settings?.allow_bind_mounts_for_regular_users;
        self.available_categories =
            catalog::categories_for(&templates, self.state.filters.template_type);
        self.templates = templates;
        Ok(())
    }

    /// Local networks always; swarm networks only when they can be attached to.
    fn offered_networks(&self, networks: Vec<Network>) -> Vec<Network> {
        let swarm_attachable = self.endpoint.supports_stacks();
        networks
            .into_iter()
            .filter(|n| match n.scope {
                NetworkScope::Swarm => swarm_attachable && n.attachable,
                NetworkScope::Local | NetworkScope::Global => true,
            })
            .collect()
    }

    pub fn catalog_key(&self) -> CatalogKey {
        self.catalog_key
    }

    pub fn user(&self) -> &UserDetails {
        &self.user
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn available_categories(&self) -> &[String] {
        &self.available_categories
    }

    pub fn available_networks(&self) -> &[Network] {
        &self.available_networks
    }

    pub fn available_volumes(&self) -> &[VolumeInfo] {
        &self.available_volumes
    }

    pub fn running_containers(&self) -> &[ContainerSummary] {
        &self.running_containers
    }

    /// Bind mounts are offered to admins, and to everyone else when the platform allows it.
    pub fn bind_mounts_allowed(&self) -> bool {
        self.user.is_admin() || self.allow_bind_mounts
    }

    pub fn filtered_templates(&self) -> Vec<&Template> {
        self.state.filters.apply(&self.templates)
    }

    /// Switch the type filter; clears the category filter and recomputes categories.
    pub fn update_categories(&mut self, template_type: TemplateType) {
        self.state.filters.template_type = template_type;
        self.state.filters.category = None;
        self.available_categories = catalog::categories_for(&self.templates, template_type);
    }

    pub fn select_template(&mut self, index: usize) -> crate::Result<SelectionChange> {
        let template = self
            .templates
            .get(index)
            .ok_or(DockyardError::TemplateNotFound(index))?;
        Ok(self.state.select(template, &self.available_networks))
    }

    pub fn unselect_template(&mut self) {
        self.state.deselect();
    }

    /// Submit the form for the selected template.
    ///
    /// Validation errors are stored on the form and not notified. Rejections at the boundary
    /// (busy, nothing selected) are returned as they are. Engine and ownership failures are
    /// notified. The in-progress flag is cleared on every path.
    pub async fn create_template(&mut self) -> Result<DeploymentOutcome, DeployError> {
        self.state.form_validation_error = None;
        if let Err(message) = self
            .state
            .form
            .access_control
            .validate(self.user.is_admin())
        {
            self.state.form_validation_error = Some(message.clone());
            return Err(DeployError::Validation(message));
        }

        let _guard = self.state.try_begin_action()?;

        let is_stack = match self.state.selected() {
            Some(template) => template.is_stack(),
            None => return Err(DeployError::NoTemplateSelected),
        };

        let result = if is_stack {
            self.deploy_stack().await
        } else {
            self.deploy_container().await
        };

        match &result {
            Ok(outcome) => {
                let message = if is_stack {
                    "Stack successfully deployed"
                } else {
                    "Container successfully created"
                };
                self.services
                    .notifier
                    .success(message, Some(outcome.resource_id.as_str()));
            }
            Err(e) => self.report_failure(is_stack, e),
        }

        result
    }

    async fn deploy_container(&mut self) -> Result<DeploymentOutcome, DeployError> {
        let template = self
            .state
            .selected()
            .ok_or(DeployError::NoTemplateSelected)?;
        let network = self
            .state
            .form
            .network
            .as_ref()
            .ok_or(DeployError::NoNetworkSelected)?;

        let pipeline =
            ContainerPipeline::new(self.services.engine.clone(), self.services.ownership.clone());
        pipeline
            .run(ContainerRequest {
                template,
                name: &self.state.form.name,
                network,
                user: &self.user,
                access: &self.state.form.access_control,
            })
            .await
    }

    async fn deploy_stack(&mut self) -> Result<DeploymentOutcome, DeployError> {
        let pipeline =
            StackPipeline::new(self.services.stacks.clone(), self.services.ownership.clone());
        let name = self.state.form.name.clone();
        let access = self.state.form.access_control.clone();
        let template = self
            .state
            .selected_mut()
            .ok_or(DeployError::NoTemplateSelected)?;

        pipeline
            .run(StackRequest {
                template,
                name: &name,
                user: &self.user,
                access: &access,
            })
            .await
    }

    fn report_failure(&mut self, is_stack: bool, error: &DeployError) {
        match error.kind() {
            ErrorKind::Validation => {
                self.state.form_validation_error = Some(error.to_string());
            }
            ErrorKind::Rejected => log_warn!("Deployment rejected: {}", error),
            ErrorKind::Provisioning if is_stack => {
                let message = error.detail().unwrap_or("Unable to deploy stack");
                self.services.notifier.warning("Deployment error", message);
            }
            // the resource exists; say so instead of reporting a failed deployment
            ErrorKind::Registration if is_stack => {
                self.services
                    .notifier
                    .warning("Deployment error", &error.to_string());
            }
            ErrorKind::Provisioning | ErrorKind::Registration => {
                self.services
                    .notifier
                    .error("Failure", error, &error.to_string());
            }
        }
    }
}
