use crate::access::{UserDetails, UserRole};
use crate::{DockyardError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockyardConfig {
    /// Template list served under the `containers` catalog key
    #[serde(default)]
    pub templates_url: Option<String>,
    /// Directory for ownership records and stack checkouts
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub settings: PlatformSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_binary")]
    pub binary: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
        }
    }
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_binary")]
    pub binary: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
        }
    }
}

fn default_git_binary() -> String {
    "git".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointProvider {
    #[default]
    DockerStandalone,
    DockerSwarmMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    #[default]
    Manager,
    Worker,
}

/// The engine endpoint deployments target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub provider: EndpointProvider,
    #[serde(default)]
    pub role: EndpointRole,
    #[serde(default = "default_api_version")]
    pub api_version: f64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            provider: EndpointProvider::default(),
            role: EndpointRole::default(),
            api_version: default_api_version(),
        }
    }
}

fn default_api_version() -> f64 {
    1.41
}

impl EndpointConfig {
    pub fn is_swarm(&self) -> bool {
        self.provider == EndpointProvider::DockerSwarmMode
    }

    /// Swarm manager recent enough to deploy stacks and attach to swarm networks.
    pub fn supports_stacks(&self) -> bool {
        self.is_swarm() && self.role == EndpointRole::Manager && self.api_version >= 1.25
    }
}

/// The local operator identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: u64,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_true")]
    pub admin: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
            username: default_username(),
            admin: true,
        }
    }
}

fn default_user_id() -> u64 {
    1
}

fn default_username() -> String {
    std::env::var("USER").unwrap_or_else(|_| "admin".to_string())
}

fn default_true() -> bool {
    true
}

impl UserConfig {
    pub fn details(&self) -> UserDetails {
        UserDetails {
            id: self.id,
            username: self.username.clone(),
            role: if self.admin {
                UserRole::Administrator
            } else {
                UserRole::Standard
            },
        }
    }
}

/// Public platform settings shown to every user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_true")]
    pub allow_bind_mounts_for_regular_users: bool,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            allow_bind_mounts_for_regular_users: true,
        }
    }
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn public_settings(&self) -> Result<PlatformSettings>;
}

#[async_trait]
impl SettingsProvider for DockyardConfig {
    async fn public_settings(&self) -> Result<PlatformSettings> {
        Ok(self.settings.clone())
    }
}

impl DockyardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: DockyardConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_str(contents: &str) -> Result<Self> {
        let config: DockyardConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| DockyardError::ConfigError(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/dockyard/dockyard.toml`, or `./dockyard.toml` without a config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("dockyard").join("dockyard.toml"))
            .unwrap_or_else(|| PathBuf::from("dockyard.toml"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("dockyard"))
                .unwrap_or_else(|| PathBuf::from(".dockyard"))
        })
    }

    pub fn ownership_store_path(&self) -> PathBuf {
        self.data_dir().join("resource_controls.json")
    }

    pub fn stack_workdir(&self) -> PathBuf {
        self.data_dir().join("stacks")
    }
}
