//! Deployment pipelines.
//!
//! Each pipeline is a fixed, ordered list of [`DeployStep`]s. A step only starts once the
//! previous one has succeeded; the first failure ends the attempt. Nothing is rolled back:
//! resources created before the failing step are listed in the error as [`LeftBehind`].

use crate::access::{
    self, AccessControlData, OwnershipService, ResourceControl, ResourceKind, UserDetails,
};
use crate::builder::{self, DeploymentConfiguration};
use crate::engine::{ContainerEngine, Network};
use crate::stack::{RepositoryReference, StackEnvVar, StackService};
use crate::template::Template;
use crate::volumes;
use crate::{log_error, log_info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStep {
    ValidateAccess,
    ProvisionVolumes,
    BuildConfiguration,
    PullImage,
    CreateContainer,
    ResolveEnvironment,
    DeployStack,
    RegisterOwnership,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeployStep::ValidateAccess => "access control validation",
            DeployStep::ProvisionVolumes => "volume provisioning",
            DeployStep::BuildConfiguration => "configuration build",
            DeployStep::PullImage => "image pull",
            DeployStep::CreateContainer => "container creation",
            DeployStep::ResolveEnvironment => "environment resolution",
            DeployStep::DeployStack => "stack deployment",
            DeployStep::RegisterOwnership => "ownership registration",
        };
        f.write_str(label)
    }
}

/// Resources that exist after a failed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftBehind {
    pub volumes: Vec<String>,
    pub container: Option<String>,
    pub stack: Option<String>,
}

impl LeftBehind {
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty() && self.container.is_none() && self.stack.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any side effect; shown inline on the form
    Validation,
    /// Refused at the submission boundary
    Rejected,
    Provisioning,
    Registration,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("{0}")]
    Validation(String),

    #[error("A deployment is already in progress")]
    Busy,

    #[error("No template selected")]
    NoTemplateSelected,

    #[error("No network selected")]
    NoNetworkSelected,

    #[error("Template cannot be deployed: {0}")]
    InvalidTemplate(String),

    #[error("{step} failed: {message}")]
    Provisioning {
        step: DeployStep,
        message: String,
        detail: Option<String>,
        left_behind: LeftBehind,
    },

    #[error("{kind} {resource_id} was created but ownership could not be applied: {message}")]
    Registration {
        kind: ResourceKind,
        resource_id: String,
        message: String,
        left_behind: LeftBehind,
    },
}

impl DeployError {
    pub fn provisioning(step: DeployStep, message: String, left_behind: LeftBehind) -> Self {
        DeployError::Provisioning {
            step,
            message,
            detail: None,
            left_behind,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Validation(_) => ErrorKind::Validation,
            DeployError::Busy
            | DeployError::NoTemplateSelected
            | DeployError::NoNetworkSelected
            | DeployError::InvalidTemplate(_) => ErrorKind::Rejected,
            DeployError::Provisioning { .. } => ErrorKind::Provisioning,
            DeployError::Registration { .. } => ErrorKind::Registration,
        }
    }

    pub fn left_behind(&self) -> Option<&LeftBehind> {
        match self {
            DeployError::Provisioning { left_behind, .. }
            | DeployError::Registration { left_behind, .. } => Some(left_behind),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            DeployError::Provisioning { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Listing the view moves to after a successful deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Containers,
    Stacks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub route: Route,
    pub kind: ResourceKind,
    pub resource_id: String,
    pub generated_volumes: Vec<String>,
    pub configuration: Option<DeploymentConfiguration>,
    pub ownership: Option<ResourceControl>,
}

pub struct ContainerRequest<'a> {
    pub template: &'a Template,
    pub name: &'a str,
    pub network: &'a Network,
    pub user: &'a UserDetails,
    pub access: &'a AccessControlData,
}

/// validate → provision volumes → build → pull → create+start → register ownership
pub struct ContainerPipeline {
    engine: Arc<dyn ContainerEngine>,
    ownership: Arc<dyn OwnershipService>,
}

impl ContainerPipeline {
    pub const STEPS: [DeployStep; 6] = [
        DeployStep::ValidateAccess,
        DeployStep::ProvisionVolumes,
        DeployStep::BuildConfiguration,
        DeployStep::PullImage,
        DeployStep::CreateContainer,
        DeployStep::RegisterOwnership,
    ];

    pub fn new(engine: Arc<dyn ContainerEngine>, ownership: Arc<dyn OwnershipService>) -> Self {
        Self { engine, ownership }
    }

    pub async fn run(
        &self,
        request: ContainerRequest<'_>,
    ) -> Result<DeploymentOutcome, DeployError> {
        let ContainerRequest {
            template,
            name,
            network,
            user,
            access,
        } = request;

        step_started(&Self::STEPS, DeployStep::ValidateAccess, &template.title);
        access
            .validate(user.is_admin())
            .map_err(DeployError::Validation)?;

        builder::check_volumes(&template.volumes).map_err(DeployError::InvalidTemplate)?;

        step_started(&Self::STEPS, DeployStep::ProvisionVolumes, &template.title);
        let required = volumes::required_count(&template.volumes);
        let generated = volumes::provision(self.engine.as_ref(), required).await?;

        step_started(&Self::STEPS, DeployStep::BuildConfiguration, &template.title);
        let configuration = builder::build(template, name, network, &generated);
        log_info!(
            "Resolved {} on network {} ({})",
            configuration.image,
            configuration.network_mode,
            configuration.name_resolution
        );

        step_started(&Self::STEPS, DeployStep::PullImage, &template.title);
        if let Err(e) = self
            .engine
            .pull_image(&template.image, template.registry.as_deref())
            .await
        {
            return Err(step_failed(
                DeployStep::PullImage,
                e.to_string(),
                LeftBehind {
                    volumes: generated,
                    ..LeftBehind::default()
                },
            ));
        }

        step_started(&Self::STEPS, DeployStep::CreateContainer, &template.title);
        let container = match self.engine.create_and_start_container(&configuration).await {
            Ok(container) => container,
            Err(e) => {
                return Err(step_failed(
                    DeployStep::CreateContainer,
                    e.to_string(),
                    LeftBehind {
                        volumes: generated,
                        ..LeftBehind::default()
                    },
                ));
            }
        };
        log_info!("Container {} created and started", container.id);

        step_started(&Self::STEPS, DeployStep::RegisterOwnership, &template.title);
        let ownership = match access::apply_ownership(
            self.ownership.as_ref(),
            ResourceKind::Container,
            &container.id,
            user.id,
            access,
            &generated,
        )
        .await
        {
            Ok(ownership) => ownership,
            Err(e) => {
                log_error!("Ownership registration failed for {}: {}", container.id, e);
                return Err(DeployError::Registration {
                    kind: ResourceKind::Container,
                    resource_id: container.id.clone(),
                    message: e.to_string(),
                    left_behind: LeftBehind {
                        volumes: generated,
                        container: Some(container.id),
                        stack: None,
                    },
                });
            }
        };

        Ok(DeploymentOutcome {
            route: Route::Containers,
            kind: ResourceKind::Container,
            resource_id: container.id,
            generated_volumes: generated,
            configuration: Some(configuration),
            ownership,
        })
    }
}

pub struct StackRequest<'a> {
    /// Working copy; env overrides are applied to it in place
    pub template: &'a mut Template,
    pub name: &'a str,
    pub user: &'a UserDetails,
    pub access: &'a AccessControlData,
}

/// validate → resolve env → deploy from repository → register ownership
pub struct StackPipeline {
    stacks: Arc<dyn StackService>,
    ownership: Arc<dyn OwnershipService>,
}

impl StackPipeline {
    pub const STEPS: [DeployStep; 4] = [
        DeployStep::ValidateAccess,
        DeployStep::ResolveEnvironment,
        DeployStep::DeployStack,
        DeployStep::RegisterOwnership,
    ];

    pub fn new(stacks: Arc<dyn StackService>, ownership: Arc<dyn OwnershipService>) -> Self {
        Self { stacks, ownership }
    }

    pub async fn run(&self, request: StackRequest<'_>) -> Result<DeploymentOutcome, DeployError> {
        let StackRequest {
            template,
            name,
            user,
            access,
        } = request;

        step_started(&Self::STEPS, DeployStep::ValidateAccess, &template.title);
        access
            .validate(user.is_admin())
            .map_err(DeployError::Validation)?;

        step_started(&Self::STEPS, DeployStep::ResolveEnvironment, &template.title);
        template.apply_env_overrides();
        let env: Vec<StackEnvVar> = template
            .env
            .iter()
            .map(|var| StackEnvVar {
                name: var.name.clone(),
                value: var.value.clone().unwrap_or_default(),
            })
            .collect();

        let repository = match &template.repository {
            Some(repo) => RepositoryReference {
                repository_url: repo.url.clone(),
                stackfile_path: repo.stackfile.clone(),
            },
            None => {
                return Err(DeployError::InvalidTemplate(format!(
                    "stack template '{}' has no repository",
                    template.title
                )));
            }
        };

        step_started(&Self::STEPS, DeployStep::DeployStack, &template.title);
        let stack = self
            .stacks
            .create_stack_from_repository(name, &repository, &env)
            .await
            .map_err(|e| {
                log_error!("Stack {} failed to deploy: {}", name, e);
                DeployError::Provisioning {
                    step: DeployStep::DeployStack,
                    message: e.to_string(),
                    detail: e.detail().map(str::to_string),
                    left_behind: LeftBehind::default(),
                }
            })?;
        log_info!("Stack {} deployed (id {})", name, stack.id);

        // stacks are controlled by name; they own their services and volumes
        step_started(&Self::STEPS, DeployStep::RegisterOwnership, &template.title);
        let ownership = access::apply_ownership(
            self.ownership.as_ref(),
            ResourceKind::Stack,
            name,
            user.id,
            access,
            &[],
        )
        .await
        .map_err(|e| {
            log_error!("Ownership registration failed for stack {}: {}", name, e);
            DeployError::Registration {
                kind: ResourceKind::Stack,
                resource_id: name.to_string(),
                message: e.to_string(),
                left_behind: LeftBehind {
                    stack: Some(name.to_string()),
                    ..LeftBehind::default()
                },
            }
        })?;

        Ok(DeploymentOutcome {
            route: Route::Stacks,
            kind: ResourceKind::Stack,
            resource_id: name.to_string(),
            generated_volumes: Vec::new(),
            configuration: None,
            ownership,
        })
    }
}

/// 1-based position of `step` in a pipeline's step list.
fn step_position(steps: &[DeployStep], step: DeployStep) -> usize {
    steps.iter().position(|s| *s == step).map_or(0, |i| i + 1)
}

fn step_started(steps: &[DeployStep], step: DeployStep, title: &str) {
    log_info!(
        "[{}] step {}/{}: {}",
        title,
        step_position(steps, step),
        steps.len(),
        step
    );
}

fn step_failed(step: DeployStep, message: String, left_behind: LeftBehind) -> DeployError {
    log_error!("{} failed: {}", step, message);
    if !left_behind.is_empty() {
        log_error!("Resources left in place: {:?}", left_behind);
    }
    DeployError::provisioning(step, message, left_behind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_in_order() {
        assert_eq!(step_position(&ContainerPipeline::STEPS, DeployStep::ValidateAccess), 1);
        assert_eq!(step_position(&ContainerPipeline::STEPS, DeployStep::BuildConfiguration), 3);
        assert_eq!(step_position(&StackPipeline::STEPS, DeployStep::RegisterOwnership), 4);
        assert_eq!(step_position(&StackPipeline::STEPS, DeployStep::PullImage), 0);
    }
}
