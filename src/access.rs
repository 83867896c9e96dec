//! Access control: who may see a deployed resource, and the registrar that records it.

use crate::{log_debug, log_info};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

pub type UserId = u64;
pub type TeamId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Administrator,
    Standard,
}

/// The submitting user, as supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
}

impl UserDetails {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Administrator
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    Administrators,
    #[default]
    Private,
    Restricted,
}

impl std::str::FromStr for Ownership {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administrators" | "admin" => Ok(Self::Administrators),
            "private" => Ok(Self::Private),
            "restricted" => Ok(Self::Restricted),
            _ => Err(format!("Unknown ownership: {}", s)),
        }
    }
}

/// Access-control choices made on the deployment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlData {
    /// Disabled means the resource is public and nothing is registered
    pub enabled: bool,
    pub ownership: Ownership,
    pub authorized_users: Vec<UserId>,
    pub authorized_teams: Vec<TeamId>,
}

impl Default for AccessControlData {
    fn default() -> Self {
        Self {
            enabled: true,
            ownership: Ownership::Private,
            authorized_users: Vec::new(),
            authorized_teams: Vec::new(),
        }
    }
}

impl AccessControlData {
    pub fn public() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Returns the message to show inline on the form when the choices are not acceptable.
    pub fn validate(&self, is_admin: bool) -> Result<(), String> {
        if !self.enabled || self.ownership != Ownership::Restricted {
            return Ok(());
        }

        if is_admin {
            if self.authorized_users.is_empty() && self.authorized_teams.is_empty() {
                return Err("You must specify at least one team or user.".to_string());
            }
        } else if self.authorized_teams.is_empty() {
            return Err("You must specify at least a team.".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Volume,
    Stack,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Container => f.write_str("container"),
            ResourceKind::Volume => f.write_str("volume"),
            ResourceKind::Stack => f.write_str("stack"),
        }
    }
}

/// What the ownership service is asked to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceControlRequest {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub sub_resource_ids: Vec<String>,
    pub administrators_only: bool,
    pub users: Vec<UserId>,
    pub teams: Vec<TeamId>,
}

impl ResourceControlRequest {
    /// Translate form choices into the users/teams that may access the resource.
    pub fn new(
        kind: ResourceKind,
        resource_id: &str,
        user_id: UserId,
        access: &AccessControlData,
        related_ids: &[String],
    ) -> Self {
        let (administrators_only, users, teams) = match access.ownership {
            Ownership::Administrators => (true, Vec::new(), Vec::new()),
            Ownership::Private => (false, vec![user_id], Vec::new()),
            Ownership::Restricted => (
                false,
                access.authorized_users.clone(),
                access.authorized_teams.clone(),
            ),
        };

        Self {
            kind,
            resource_id: resource_id.to_string(),
            sub_resource_ids: related_ids.to_vec(),
            administrators_only,
            users,
            teams,
        }
    }
}

/// A recorded ownership entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceControl {
    pub id: Uuid,
    pub kind: ResourceKind,
    pub resource_id: String,
    pub sub_resource_ids: Vec<String>,
    pub administrators_only: bool,
    pub users: Vec<UserId>,
    pub teams: Vec<TeamId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum OwnershipError {
    #[error("A resource control is already applied on {kind} {resource_id}")]
    AlreadyControlled {
        kind: ResourceKind,
        resource_id: String,
    },

    #[error("Ownership store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Backing store for ownership records.
#[async_trait]
pub trait OwnershipService: Send + Sync {
    async fn create_resource_control(
        &self,
        request: ResourceControlRequest,
    ) -> Result<ResourceControl, OwnershipError>;
}

/// Record ownership of a freshly created resource.
///
/// `related_ids` are sub-resources (generated volumes) that inherit the same control in the
/// same record. Returns `None` when access control is disabled: the resource stays public.
pub async fn apply_ownership(
    service: &dyn OwnershipService,
    kind: ResourceKind,
    resource_id: &str,
    user_id: UserId,
    access: &AccessControlData,
    related_ids: &[String],
) -> Result<Option<ResourceControl>, OwnershipError> {
    if !access.enabled {
        log_debug!("Access control disabled, {} {} stays public", kind, resource_id);
        return Ok(None);
    }

    let request = ResourceControlRequest::new(kind, resource_id, user_id, access, related_ids);
    let control = service.create_resource_control(request).await?;
    log_info!(
        "Ownership applied to {} {} ({} related resource(s))",
        kind,
        resource_id,
        related_ids.len()
    );
    Ok(Some(control))
}

/// JSON-file ownership store.
pub struct FileOwnershipStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileOwnershipStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list(&self) -> Result<Vec<ResourceControl>, OwnershipError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn read_all(&self) -> Result<Vec<ResourceControl>, OwnershipError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, controls: &[ResourceControl]) -> Result<(), OwnershipError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(controls)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl OwnershipService for FileOwnershipStore {
    async fn create_resource_control(
        &self,
        request: ResourceControlRequest,
    ) -> Result<ResourceControl, OwnershipError> {
        let _guard = self.lock.lock().await;
        let mut controls = self.read_all().await?;

        let taken = controls.iter().any(|c| {
            c.resource_id == request.resource_id
                || c.sub_resource_ids.contains(&request.resource_id)
                || request
                    .sub_resource_ids
                    .iter()
                    .any(|s| *s == c.resource_id || c.sub_resource_ids.contains(s))
        });
        if taken {
            return Err(OwnershipError::AlreadyControlled {
                kind: request.kind,
                resource_id: request.resource_id,
            });
        }

        let control = ResourceControl {
            id: Uuid::new_v4(),
            kind: request.kind,
            resource_id: request.resource_id,
            sub_resource_ids: request.sub_resource_ids,
            administrators_only: request.administrators_only,
            users: request.users,
            teams: request.teams,
            created_at: Utc::now(),
        };
        controls.push(control.clone());
        self.write_all(&controls).await?;

        Ok(control)
    }
}
