// Recording fakes for the orchestration collaborators
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use dockyard::Template;
use dockyard::access::{
    OwnershipError, OwnershipService, ResourceControl, ResourceControlRequest, UserDetails,
    UserRole,
};
use dockyard::builder::DeploymentConfiguration;
use dockyard::catalog::{self, CatalogError, CatalogKey, CatalogSource};
use dockyard::config::{PlatformSettings, SettingsProvider};
use dockyard::engine::{
    ContainerEngine, ContainerSummary, CreatedContainer, EngineError, Network, Result, VolumeInfo,
};
use dockyard::notify::Notifier;
use dockyard::stack::{CreatedStack, RepositoryReference, StackEnvVar, StackError, StackService};
use dockyard::view::Collaborators;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEMPLATES: &str = r#"[
  {
    "type": "container",
    "title": "Nginx",
    "description": "High performance web server",
    "categories": ["webserver"],
    "platform": "linux",
    "image": "nginx",
    "ports": [{ "container_port": 80, "protocol": "tcp" }],
    "volumes": [{ "container": "/data" }]
  },
  {
    "type": "container",
    "title": "Postgres",
    "categories": ["database"],
    "platform": "linux",
    "image": "postgres:16",
    "network": "backend",
    "name": "db",
    "env": [{ "name": "POSTGRES_PASSWORD", "value": "secret" }]
  },
  {
    "type": "stack",
    "title": "Wordpress",
    "categories": ["cms", "blog"],
    "repository": { "url": "https://github.com/example/stacks", "stackfile": "wordpress/docker-stack.yml" },
    "env": [{ "name": "X", "set": "5" }, { "name": "Y", "default": "y" }]
  }
]"#;

pub fn templates() -> Vec<Template> {
    catalog::parse_templates(TEMPLATES).unwrap()
}

pub fn template(json: &str) -> Template {
    serde_json::from_str(json).unwrap()
}

pub fn admin() -> UserDetails {
    UserDetails {
        id: 1,
        username: "admin".to_string(),
        role: UserRole::Administrator,
    }
}

pub fn standard_user() -> UserDetails {
    UserDetails {
        id: 7,
        username: "alice".to_string(),
        role: UserRole::Standard,
    }
}

pub fn bridge() -> Network {
    Network::local("n-bridge", "bridge", "bridge")
}

pub fn backend() -> Network {
    Network::local("n-backend", "backend", "bridge")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateVolumes(usize),
    Pull(String, Option<String>),
    Create(DeploymentConfiguration),
    ListNetworks,
    ListVolumes,
    ListContainers,
}

#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub networks: Vec<Network>,
    pub fail_volumes: bool,
    /// Create one volume fewer than asked
    pub short_volumes: bool,
    pub fail_pull: bool,
    pub fail_create: bool,
    pub fail_listing: bool,
    pub volume_seq: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            networks: vec![bridge(), backend()],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_anonymous_volumes(&self, count: usize) -> Result<Vec<VolumeInfo>> {
        self.record(EngineCall::CreateVolumes(count));
        if self.fail_volumes {
            return Err(EngineError::VolumeCreateFailed("disk full".to_string()));
        }
        let count = if self.short_volumes {
            count.saturating_sub(1)
        } else {
            count
        };
        Ok((0..count)
            .map(|_| VolumeInfo {
                id: format!("vol{}", self.volume_seq.fetch_add(1, Ordering::SeqCst) + 1),
                driver: "local".to_string(),
            })
            .collect())
    }

    async fn pull_image(&self, image: &str, registry: Option<&str>) -> Result<()> {
        self.record(EngineCall::Pull(
            image.to_string(),
            registry.map(str::to_string),
        ));
        if self.fail_pull {
            return Err(EngineError::PullFailed {
                image: image.to_string(),
                message: "manifest unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn create_and_start_container(
        &self,
        config: &DeploymentConfiguration,
    ) -> Result<CreatedContainer> {
        self.record(EngineCall::Create(config.clone()));
        if self.fail_create {
            return Err(EngineError::CreateFailed("port already allocated".to_string()));
        }
        Ok(CreatedContainer {
            id: "c0ffee".to_string(),
        })
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        self.record(EngineCall::ListNetworks);
        if self.fail_listing {
            return Err(EngineError::NotAvailable("engine down".to_string()));
        }
        Ok(self.networks.clone())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>> {
        self.record(EngineCall::ListVolumes);
        Ok(Vec::new())
    }

    async fn list_containers(&self, _all: bool) -> Result<Vec<ContainerSummary>> {
        self.record(EngineCall::ListContainers);
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct FakeOwnership {
    pub requests: Mutex<Vec<ResourceControlRequest>>,
    pub fail: bool,
}

impl FakeOwnership {
    pub fn requests(&self) -> Vec<ResourceControlRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl OwnershipService for FakeOwnership {
    async fn create_resource_control(
        &self,
        request: ResourceControlRequest,
    ) -> std::result::Result<ResourceControl, OwnershipError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(OwnershipError::Store("ownership backend unavailable".to_string()));
        }
        Ok(ResourceControl {
            id: Uuid::new_v4(),
            kind: request.kind,
            resource_id: request.resource_id,
            sub_resource_ids: request.sub_resource_ids,
            administrators_only: request.administrators_only,
            users: request.users,
            teams: request.teams,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackCall {
    pub name: String,
    pub repository: RepositoryReference,
    pub env: Vec<StackEnvVar>,
}

#[derive(Default)]
pub struct FakeStacks {
    pub calls: Mutex<Vec<StackCall>>,
    pub fail_with: Option<String>,
}

impl FakeStacks {
    pub fn calls(&self) -> Vec<StackCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StackService for FakeStacks {
    async fn create_stack_from_repository(
        &self,
        name: &str,
        repository: &RepositoryReference,
        env: &[StackEnvVar],
    ) -> std::result::Result<CreatedStack, StackError> {
        self.calls.lock().unwrap().push(StackCall {
            name: name.to_string(),
            repository: repository.clone(),
            env: env.to_vec(),
        });
        if let Some(detail) = &self.fail_with {
            return Err(StackError::DeployFailed {
                detail: Some(detail.clone()),
            });
        }
        Ok(CreatedStack {
            id: format!("stack-{}", name),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String, Option<String>),
    Error(String, String),
    Warning(String, String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str, detail: Option<&str>) {
        self.notices.lock().unwrap().push(Notice::Success(
            message.to_string(),
            detail.map(str::to_string),
        ));
    }

    fn error(&self, title: &str, _err: &dyn std::error::Error, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Error(title.to_string(), message.to_string()));
    }

    fn warning(&self, title: &str, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Warning(title.to_string(), message.to_string()));
    }
}

pub struct FakeCatalog {
    pub json: Option<String>,
    pub requested: Mutex<Vec<CatalogKey>>,
}

impl FakeCatalog {
    pub fn new(json: &str) -> Self {
        Self {
            json: Some(json.to_string()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            json: None,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn get_templates(
        &self,
        key: CatalogKey,
    ) -> std::result::Result<Vec<Template>, CatalogError> {
        self.requested.lock().unwrap().push(key);
        match &self.json {
            Some(json) => catalog::parse_templates(json),
            None => Err(CatalogError::Http {
                url: "https://templates.invalid".to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

pub struct FixedSettings(pub PlatformSettings);

#[async_trait]
impl SettingsProvider for FixedSettings {
    async fn public_settings(&self) -> dockyard::Result<PlatformSettings> {
        Ok(self.0.clone())
    }
}

/// Fakes wired into [`Collaborators`], with handles kept for inspection.
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub engine: Arc<FakeEngine>,
    pub stacks: Arc<FakeStacks>,
    pub ownership: Arc<FakeOwnership>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeCatalog::new(TEMPLATES), FakeEngine::new())
    }

    pub fn with(catalog: FakeCatalog, engine: FakeEngine) -> Self {
        Self {
            catalog: Arc::new(catalog),
            engine: Arc::new(engine),
            stacks: Arc::new(FakeStacks::default()),
            ownership: Arc::new(FakeOwnership::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            catalog: self.catalog.clone(),
            engine: self.engine.clone(),
            stacks: self.stacks.clone(),
            ownership: self.ownership.clone(),
            settings: Arc::new(FixedSettings(PlatformSettings::default())),
            notifier: self.notifier.clone(),
        }
    }
}
