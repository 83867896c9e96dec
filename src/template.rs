use serde::{Deserialize, Serialize};
use std::fmt;

/// What a template deploys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    #[default]
    Container,
    Stack,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Container => "container",
            TemplateType::Stack => "stack",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "container" => Ok(Self::Container),
            "stack" => Ok(Self::Stack),
            _ => Err(format!("Unknown template type: {}", s)),
        }
    }
}

/// An application template as published in a catalog.
///
/// Catalog entries are never edited; selection clones a working copy and all user edits go
/// there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Position in the catalog the template was loaded from
    #[serde(skip)]
    pub index: usize,
    #[serde(rename = "type", default)]
    pub template_type: TemplateType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub registry: Option<String>,
    /// Preferred network name
    #[serde(default)]
    pub network: Option<String>,
    /// Default instance name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub volumes: Vec<VolumeDeclaration>,
    #[serde(default)]
    pub ports: Vec<PortBinding>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub repository: Option<Repository>,
}

impl Template {
    pub fn is_stack(&self) -> bool {
        self.template_type == TemplateType::Stack
    }

    pub fn add_volume(&mut self, volume: VolumeDeclaration) {
        self.volumes.push(volume);
    }

    pub fn remove_volume(&mut self, index: usize) -> Option<VolumeDeclaration> {
        (index < self.volumes.len()).then(|| self.volumes.remove(index))
    }

    pub fn add_port_binding(&mut self, port: PortBinding) {
        self.ports.push(port);
    }

    pub fn remove_port_binding(&mut self, index: usize) -> Option<PortBinding> {
        (index < self.ports.len()).then(|| self.ports.remove(index))
    }

    pub fn add_extra_host(&mut self, host: impl Into<String>) {
        self.hosts.push(host.into());
    }

    pub fn remove_extra_host(&mut self, index: usize) -> Option<String> {
        (index < self.hosts.len()).then(|| self.hosts.remove(index))
    }

    pub fn add_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn remove_label(&mut self, index: usize) -> Option<Label> {
        (index < self.labels.len()).then(|| self.labels.remove(index))
    }

    /// Replace every env value carrying a `set` override with the override.
    pub fn apply_env_overrides(&mut self) {
        for var in &mut self.env {
            if let Some(set) = &var.set {
                var.value = Some(set.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeBindingType {
    /// Anonymous volume generated at deployment time
    #[default]
    Auto,
    /// Host path bind mount
    Bind,
    /// Pre-existing named volume
    Volume,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDeclaration {
    /// Path inside the container
    pub container: String,
    /// Host path or volume name
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(rename = "type", default)]
    pub binding: VolumeBindingType,
    #[serde(default)]
    pub readonly: bool,
}

impl VolumeDeclaration {
    pub fn auto(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    pub fn bound(
        container: impl Into<String>,
        bind: impl Into<String>,
        binding: VolumeBindingType,
    ) -> Self {
        Self {
            container: container.into(),
            bind: Some(bind.into()),
            binding,
            readonly: false,
        }
    }

    /// True when the orchestrator has to create an anonymous volume for this declaration.
    pub fn needs_generated_volume(&self) -> bool {
        self.binding == VolumeBindingType::Auto
            && self.bind.as_deref().is_none_or(|b| b.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Accepts `{"host_port", "container_port", "protocol"}` objects and the short
/// `"[host:]container[/protocol]"` string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PortBindingRepr")]
pub struct PortBinding {
    /// `port` or `ip:port`; unset lets the engine choose
    #[serde(default)]
    pub host_port: Option<String>,
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl PortBinding {
    pub fn new(host_port: Option<&str>, container_port: u16, protocol: Protocol) -> Self {
        Self {
            host_port: host_port.map(str::to_string),
            container_port,
            protocol,
        }
    }
}

impl std::str::FromStr for PortBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ports, protocol) = match s.rsplit_once('/') {
            Some((ports, "tcp")) => (ports, Protocol::Tcp),
            Some((ports, "udp")) => (ports, Protocol::Udp),
            Some((_, other)) => return Err(format!("Unknown protocol '{}' in port {}", other, s)),
            None => (s, Protocol::Tcp),
        };

        let (host_port, container) = match ports.rsplit_once(':') {
            Some((host, container)) => (Some(host).filter(|h| !h.is_empty()), container),
            None => (None, ports),
        };
        let container_port = container
            .parse()
            .map_err(|_| format!("Invalid container port in {}", s))?;

        Ok(Self::new(host_port, container_port, protocol))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortBindingRepr {
    Short(String),
    Full {
        #[serde(default)]
        host_port: Option<String>,
        container_port: u16,
        #[serde(default)]
        protocol: Protocol,
    },
}

impl TryFrom<PortBindingRepr> for PortBinding {
    type Error = String;

    fn try_from(repr: PortBindingRepr) -> Result<Self, Self::Error> {
        match repr {
            PortBindingRepr::Short(short) => short.parse(),
            PortBindingRepr::Full {
                host_port,
                container_port,
                protocol,
            } => Ok(Self {
                host_port,
                container_port,
                protocol,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    #[default]
    Text,
    /// Value names another container the deployed one should reach
    Container,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "default")]
    pub value: Option<String>,
    /// User override; wins over `value`
    #[serde(default)]
    pub set: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: EnvKind,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// `set` if present, else `value`; empty strings count as absent.
    pub fn effective_value(&self) -> Option<&str> {
        self.set
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.value.as_deref().filter(|v| !v.is_empty()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    #[default]
    Always,
    OnFailure,
    UnlessStopped,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::UnlessStopped => "unless-stopped",
        }
    }
}

/// Source repository holding a stack definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub url: String,
    pub stackfile: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_entry() {
        let json = r#"{
            "type": "container",
            "title": "Nginx",
            "categories": ["webserver"],
            "image": "nginx:latest",
            "volumes": [{"container": "/etc/nginx"}, {"container": "/data", "bind": "/srv", "type": "bind", "readonly": true}],
            "ports": [{"container_port": 80, "host_port": "8080"}, {"container_port": 53, "protocol": "udp"}],
            "env": [{"name": "MODE", "default": "prod"}, {"name": "DB", "type": "container"}],
            "restart_policy": "unless-stopped"
        }"#;

        let template: Template = serde_json::from_str(json).unwrap();
        assert_eq!(template.template_type, TemplateType::Container);
        assert!(template.volumes[0].needs_generated_volume());
        assert!(!template.volumes[1].needs_generated_volume());
        assert!(template.volumes[1].readonly);
        assert_eq!(template.ports[1].protocol, Protocol::Udp);
        assert_eq!(template.env[0].effective_value(), Some("prod"));
        assert_eq!(template.env[1].kind, EnvKind::Container);
        assert_eq!(template.restart_policy, RestartPolicy::UnlessStopped);
    }

    #[test]
    fn set_override_wins() {
        let mut template: Template =
            serde_json::from_str(r#"{"type": "stack", "title": "s", "env": [{"name": "X", "value": "0", "set": "5"}, {"name": "Y", "value": "1"}]}"#)
                .unwrap();
        template.apply_env_overrides();
        assert_eq!(template.env[0].value.as_deref(), Some("5"));
        assert_eq!(template.env[1].value.as_deref(), Some("1"));
    }

    #[test]
    fn short_port_strings() {
        let template: Template = serde_json::from_str(
            r#"{"title": "t", "ports": ["80/tcp", "8080:80", "127.0.0.1:5353:53/udp", {"container_port": 443}]}"#,
        )
        .unwrap();

        assert_eq!(template.ports[0], PortBinding::new(None, 80, Protocol::Tcp));
        assert_eq!(template.ports[1], PortBinding::new(Some("8080"), 80, Protocol::Tcp));
        assert_eq!(
            template.ports[2],
            PortBinding::new(Some("127.0.0.1:5353"), 53, Protocol::Udp)
        );
        assert_eq!(template.ports[3].container_port, 443);

        assert!("80/sctp".parse::<PortBinding>().is_err());
        assert!("web/tcp".parse::<PortBinding>().is_err());
    }

    #[test]
    fn removal_out_of_range_is_noop() {
        let mut template: Template = serde_json::from_str(r#"{"title": "t"}"#).unwrap();
        template.add_extra_host("db:10.0.0.2");
        assert_eq!(template.remove_extra_host(3), None);
        assert_eq!(template.remove_extra_host(0).as_deref(), Some("db:10.0.0.2"));
        assert!(template.hosts.is_empty());
    }
}
