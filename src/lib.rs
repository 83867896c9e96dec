pub mod access;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod docker;
pub mod engine;
pub mod error;
pub mod logger;
pub mod notify;
pub mod pipeline;
pub mod selection;
pub mod stack;
pub mod template;
pub mod view;
pub mod volumes;

pub use error::DockyardError;
pub use template::{Template, TemplateType};

pub type Result<T> = std::result::Result<T, DockyardError>;

// Convenience re-exports for the deployment core
pub use builder::{DeploymentConfiguration, NameResolution};
pub use pipeline::{ContainerPipeline, DeployError, DeploymentOutcome, StackPipeline};
pub use selection::{Selection, SessionState};
pub use view::{Collaborators, TemplatesView};
