use crate::access::OwnershipError;
use crate::catalog::CatalogError;
use crate::engine::EngineError;
use crate::pipeline::DeployError;
use crate::stack::StackError;
use std::fmt;

#[derive(Debug)]
pub enum DockyardError {
    ConfigError(String),
    TemplateNotFound(usize),
    Catalog(CatalogError),
    Engine(EngineError),
    Stack(StackError),
    Ownership(OwnershipError),
    Deploy(DeployError),
    IoError(std::io::Error),
    SerdeError(String),
}

impl fmt::Display for DockyardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockyardError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            DockyardError::TemplateNotFound(index) => write!(f, "Template #{} not found", index),
            DockyardError::Catalog(err) => write!(f, "Catalog error: {}", err),
            DockyardError::Engine(err) => write!(f, "Engine error: {}", err),
            DockyardError::Stack(err) => write!(f, "Stack error: {}", err),
            DockyardError::Ownership(err) => write!(f, "Ownership error: {}", err),
            DockyardError::Deploy(err) => write!(f, "Deployment error: {}", err),
            DockyardError::IoError(err) => write!(f, "IO error: {}", err),
            DockyardError::SerdeError(err) => write!(f, "Configuration parse error: {}", err),
        }
    }
}

impl std::error::Error for DockyardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DockyardError::Catalog(err) => Some(err),
            DockyardError::Engine(err) => Some(err),
            DockyardError::Stack(err) => Some(err),
            DockyardError::Ownership(err) => Some(err),
            DockyardError::Deploy(err) => Some(err),
            DockyardError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DockyardError {
    fn from(err: std::io::Error) -> Self {
        DockyardError::IoError(err)
    }
}

impl From<toml::de::Error> for DockyardError {
    fn from(err: toml::de::Error) -> Self {
        DockyardError::SerdeError(err.to_string())
    }
}

impl From<serde_json::Error> for DockyardError {
    fn from(err: serde_json::Error) -> Self {
        DockyardError::SerdeError(err.to_string())
    }
}

impl From<CatalogError> for DockyardError {
    fn from(err: CatalogError) -> Self {
        DockyardError::Catalog(err)
    }
}

impl From<EngineError> for DockyardError {
    fn from(err: EngineError) -> Self {
        DockyardError::Engine(err)
    }
}

impl From<StackError> for DockyardError {
    fn from(err: StackError) -> Self {
        DockyardError::Stack(err)
    }
}

impl From<OwnershipError> for DockyardError {
    fn from(err: OwnershipError) -> Self {
        DockyardError::Ownership(err)
    }
}

impl From<DeployError> for DockyardError {
    fn from(err: DeployError) -> Self {
        DockyardError::Deploy(err)
    }
}
