//! Stack service: deploys a multi-service stack from a composition file in a git repository.

use crate::{log_debug, log_error, log_info};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Where the stack definition lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub repository_url: String,
    pub stackfile_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedStack {
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Invalid stack name: {0}")]
    InvalidName(String),

    #[error("Failed to clone {url}")]
    CloneFailed { url: String, detail: Option<String> },

    #[error("Stack file {0} not found in repository")]
    StackfileNotFound(String),

    #[error("Stack deployment failed")]
    DeployFailed { detail: Option<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackError {
    /// Error text reported by the backing tool, when it produced any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            StackError::CloneFailed { detail, .. } | StackError::DeployFailed { detail } => {
                detail.as_deref()
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait StackService: Send + Sync {
    async fn create_stack_from_repository(
        &self,
        name: &str,
        repository: &RepositoryReference,
        env: &[StackEnvVar],
    ) -> Result<CreatedStack, StackError>;
}

/// Clones the repository with `git` and deploys it with `docker stack deploy`.
pub struct GitStackService {
    git_binary: String,
    docker_binary: String,
    workdir: PathBuf,
}

impl GitStackService {
    pub fn new(
        git_binary: impl Into<String>,
        docker_binary: impl Into<String>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git_binary: git_binary.into(),
            docker_binary: docker_binary.into(),
            workdir: workdir.into(),
        }
    }

    fn validate_name(name: &str) -> Result<(), StackError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(StackError::InvalidName(name.to_string()))
        }
    }

    async fn clone_repository(&self, url: &str, target: &Path) -> Result<(), StackError> {
        if tokio::fs::try_exists(target).await? {
            tokio::fs::remove_dir_all(target).await?;
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        log_debug!("Cloning {} into {}", url, target.display());
        let output = Command::new(&self.git_binary)
            .args(["clone", "--depth", "1", url])
            .arg(target)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_error!("git clone failed: {}", stderr);
            return Err(StackError::CloneFailed {
                url: url.to_string(),
                detail: Some(stderr).filter(|s| !s.is_empty()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StackService for GitStackService {
    async fn create_stack_from_repository(
        &self,
        name: &str,
        repository: &RepositoryReference,
        env: &[StackEnvVar],
    ) -> Result<CreatedStack, StackError> {
        Self::validate_name(name)?;

        let checkout = self.workdir.join(name);
        self.clone_repository(&repository.repository_url, &checkout)
            .await?;

        let stackfile = checkout.join(&repository.stackfile_path);
        if !tokio::fs::try_exists(&stackfile).await? {
            return Err(StackError::StackfileNotFound(
                repository.stackfile_path.clone(),
            ));
        }

        log_info!("Deploying stack {} from {}", name, repository.repository_url);
        let output = Command::new(&self.docker_binary)
            .args(["stack", "deploy", "--compose-file"])
            .arg(&stackfile)
            .arg(name)
            .envs(env.iter().map(|e| (e.name.as_str(), e.value.as_str())))
            .current_dir(&checkout)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_error!("docker stack deploy failed: {}", stderr);
            return Err(StackError::DeployFailed {
                detail: Some(stderr).filter(|s| !s.is_empty()),
            });
        }

        Ok(CreatedStack {
            id: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_names_are_restricted() {
        assert!(GitStackService::validate_name("web-app_2").is_ok());
        assert!(GitStackService::validate_name("").is_err());
        assert!(GitStackService::validate_name("../etc").is_err());
    }

    #[test]
    fn detail_only_for_tool_failures() {
        let err = StackError::DeployFailed {
            detail: Some("network not found".to_string()),
        };
        assert_eq!(err.detail(), Some("network not found"));
        assert_eq!(StackError::InvalidName("x y".to_string()).detail(), None);
    }
}
