//! Container Engine Abstraction Layer
//!
//! The orchestration core talks to the container engine only through [`ContainerEngine`].
//! `docker` provides the CLI-backed implementation; tests substitute recording fakes.

use crate::builder::DeploymentConfiguration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for container engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Operations the deployment pipelines and the catalog view need from an engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Engine name, for logs
    fn name(&self) -> &str;

    /// Create `count` anonymous local volumes, returned in creation order
    async fn create_anonymous_volumes(&self, count: usize) -> Result<Vec<VolumeInfo>>;

    /// Pull an image, optionally from a specific registry
    async fn pull_image(&self, image: &str, registry: Option<&str>) -> Result<()>;

    /// Create a container from a resolved configuration and start it
    async fn create_and_start_container(
        &self,
        config: &DeploymentConfiguration,
    ) -> Result<CreatedContainer>;

    /// List networks known to the engine
    async fn list_networks(&self) -> Result<Vec<Network>>;

    /// List volumes known to the engine
    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>>;

    /// List containers
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;
}

/// Network as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: NetworkScope,
    #[serde(default)]
    pub attachable: bool,
}

impl Network {
    /// Convenience constructor for a local network
    pub fn local(
        id: impl Into<String>,
        name: impl Into<String>,
        driver: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            driver: driver.into(),
            scope: NetworkScope::Local,
            attachable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkScope {
    Local,
    Swarm,
    Global,
}

impl NetworkScope {
    pub fn parse(scope: &str) -> Self {
        match scope.trim() {
            "swarm" => NetworkScope::Swarm,
            "global" => NetworkScope::Global,
            _ => NetworkScope::Local,
        }
    }
}

/// Volume information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Volume name; for anonymous volumes this is the generated identifier
    pub id: String,
    pub driver: String,
}

/// Result of a successful container creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedContainer {
    pub id: String,
}

/// Container summary, used to resolve container references in templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
}

/// Container status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Paused,
    Restarting,
    Created,
    Dead,
    Unknown,
}

impl ContainerStatus {
    pub fn parse(status: &str) -> Self {
        let status = status.to_lowercase();
        if status.contains("up") || status.contains("running") {
            ContainerStatus::Running
        } else if status.contains("exited") {
            ContainerStatus::Stopped
        } else if status.contains("paused") {
            ContainerStatus::Paused
        } else if status.contains("restarting") {
            ContainerStatus::Restarting
        } else if status.contains("created") {
            ContainerStatus::Created
        } else if status.contains("dead") {
            ContainerStatus::Dead
        } else {
            ContainerStatus::Unknown
        }
    }
}

/// Container engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine not available: {0}")]
    NotAvailable(String),

    #[error("Failed to create volume: {0}")]
    VolumeCreateFailed(String),

    #[error("Failed to pull image {image}: {message}")]
    PullFailed { image: String, message: String },

    #[error("Failed to create container: {0}")]
    CreateFailed(String),

    #[error("Failed to start container {id}: {message}")]
    StartFailed { id: String, message: String },

    #[error("Container reference could not be resolved: {0}")]
    UnresolvedReference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}
