//! Template catalogs: where templates come from and how they are indexed.

use crate::template::{Template, TemplateType};
use crate::{log_debug, log_info};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const LINUXSERVER_TEMPLATES_URL: &str = "https://tools.linuxserver.io/chainid.json";

/// Which catalog to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKey {
    /// The operator-configured catalog
    Containers,
    LinuxServerIo,
}

impl CatalogKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKey::Containers => "containers",
            CatalogKey::LinuxServerIo => "linuxserver.io",
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CatalogKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "containers" => Ok(CatalogKey::Containers),
            "linuxserver.io" => Ok(CatalogKey::LinuxServerIo),
            other => Err(CatalogError::InvalidKey(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid catalog key: {0}")]
    InvalidKey(String),

    #[error("No templates URL configured")]
    NotConfigured,

    #[error("HTTP error fetching {url}: {message}")]
    Http { url: String, message: String },

    #[error("Invalid template list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn get_templates(&self, key: CatalogKey) -> Result<Vec<Template>, CatalogError>;
}

/// Fetches a JSON template list over HTTP(S), or reads it from a local path / `file://` URL.
pub struct HttpCatalog {
    client: reqwest::Client,
    templates_url: Option<String>,
}

impl HttpCatalog {
    pub fn new(templates_url: Option<String>) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dockyard/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Http {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            templates_url,
        })
    }

    pub fn url_for(&self, key: CatalogKey) -> Result<String, CatalogError> {
        match key {
            CatalogKey::Containers => self
                .templates_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .ok_or(CatalogError::NotConfigured),
            CatalogKey::LinuxServerIo => Ok(LINUXSERVER_TEMPLATES_URL.to_string()),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, CatalogError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
            log_debug!("Reading templates from {}", path.display());
            return Ok(tokio::fs::read_to_string(path).await?);
        }

        let http_error = |message: String| CatalogError::Http {
            url: url.to_string(),
            message,
        };

        log_debug!("Fetching templates from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(http_error(format!("status {}", response.status().as_u16())));
        }

        response.text().await.map_err(|e| http_error(e.to_string()))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn get_templates(&self, key: CatalogKey) -> Result<Vec<Template>, CatalogError> {
        let url = self.url_for(key)?;
        let body = self.fetch(&url).await?;
        let templates = parse_templates(&body)?;
        log_info!("Loaded {} template(s) from {} catalog", templates.len(), key);
        Ok(templates)
    }
}

/// Parse a JSON template list, numbering templates by position.
pub fn parse_templates(json: &str) -> Result<Vec<Template>, CatalogError> {
    let mut templates: Vec<Template> = serde_json::from_str(json)?;
    for (index, template) in templates.iter_mut().enumerate() {
        template.index = index;
    }
    Ok(templates)
}

/// Distinct categories of templates of `template_type`, sorted.
pub fn categories_for(templates: &[Template], template_type: TemplateType) -> Vec<String> {
    templates
        .iter()
        .filter(|t| t.template_type == template_type)
        .flat_map(|t| t.categories.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
