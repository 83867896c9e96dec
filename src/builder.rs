//! Turns a template plus the user's form choices into an engine-ready container specification.

use crate::engine::Network;
use crate::template::{
    EnvKind, Protocol, RestartPolicy, Template, VolumeBindingType, VolumeDeclaration,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_NETWORK: &str = "bridge";

/// How container references in the environment are resolved inside the new container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NameResolution {
    ByContainerIp,
    ByContainerName,
}

impl NameResolution {
    /// Peers on the default bridge are reached by IP, everywhere else by name.
    pub fn for_network(network: &Network) -> Self {
        if network.name == DEFAULT_NETWORK {
            NameResolution::ByContainerIp
        } else {
            NameResolution::ByContainerName
        }
    }
}

impl fmt::Display for NameResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameResolution::ByContainerIp => f.write_str("BY_CONTAINER_IP"),
            NameResolution::ByContainerName => f.write_str("BY_CONTAINER_NAME"),
        }
    }
}

/// Environment variable whose value is another container, resolved by the engine adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReference {
    pub variable: String,
    pub container: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPort {
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PublishedPort {
    /// Exposed-port key, e.g. `80/tcp`
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Host path, volume name or generated volume id
    pub source: String,
    pub target: String,
    pub read_only: bool,
    pub generated: bool,
}

impl Mount {
    pub fn bind_spec(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.source, self.target)
        } else {
            format!("{}:{}", self.source, self.target)
        }
    }
}

/// Engine-ready container specification. Built fresh for every attempt; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfiguration {
    pub name: Option<String>,
    pub image: String,
    pub network_mode: String,
    pub name_resolution: NameResolution,
    pub env: Vec<String>,
    pub service_references: Vec<ServiceReference>,
    pub labels: BTreeMap<String, String>,
    pub ports: Vec<PublishedPort>,
    pub extra_hosts: Vec<String>,
    pub mounts: Vec<Mount>,
    pub restart_policy: RestartPolicy,
    pub privileged: bool,
    pub interactive: bool,
}

impl DeploymentConfiguration {
    pub fn binds(&self) -> Vec<String> {
        self.mounts.iter().map(Mount::bind_spec).collect()
    }

    pub fn generated_volume_ids(&self) -> Vec<&str> {
        self.mounts
            .iter()
            .filter(|m| m.generated)
            .map(|m| m.source.as_str())
            .collect()
    }
}

/// `registry/image:tag`, tagging `latest` when the image carries no tag.
pub fn image_reference(image: &str, registry: Option<&str>) -> String {
    let image = match registry.map(str::trim).filter(|r| !r.is_empty()) {
        Some(registry) => format!("{}/{}", registry.trim_end_matches('/'), image),
        None => image.to_string(),
    };

    let last_segment = image.rsplit('/').next().unwrap_or(&image);
    if last_segment.contains(':') || last_segment.contains('@') {
        image
    } else {
        format!("{}:latest", image)
    }
}

/// Reject bind and named-volume declarations that have no source.
pub fn check_volumes(volumes: &[VolumeDeclaration]) -> Result<(), String> {
    let missing = volumes.iter().find(|v| {
        v.binding != VolumeBindingType::Auto
            && v.bind.as_deref().is_none_or(|b| b.trim().is_empty())
    });

    match missing {
        Some(volume) if volume.binding == VolumeBindingType::Bind => Err(format!(
            "volume {} has no host path",
            volume.container
        )),
        Some(volume) => Err(format!("volume {} has no volume name", volume.container)),
        None => Ok(()),
    }
}

/// Build the configuration for `template`.
///
/// `generated_volumes` is bound positionally to the template's auto volume declarations.
/// Bind and named-volume declarations without a source are left out; see [`check_volumes`].
///
/// # Panics
///
/// Panics when `generated_volumes` does not hold exactly one id per declaration that needs a
/// generated volume. The provisioner creates exactly that many, so a mismatch is a bug.
pub fn build(
    template: &Template,
    name: &str,
    network: &Network,
    generated_volumes: &[String],
) -> DeploymentConfiguration {
    let required = crate::volumes::required_count(&template.volumes);
    assert_eq!(
        required,
        generated_volumes.len(),
        "generated volume count must match auto volume declarations"
    );

    let name_resolution = NameResolution::for_network(network);

    let mut env = Vec::new();
    let mut service_references = Vec::new();
    for var in &template.env {
        let Some(value) = var.effective_value() else {
            continue;
        };
        match var.kind {
            EnvKind::Text => env.push(format!("{}={}", var.name, value)),
            EnvKind::Container => service_references.push(ServiceReference {
                variable: var.name.clone(),
                container: value.trim_start_matches('/').to_string(),
            }),
        }
    }

    let labels = template
        .labels
        .iter()
        .filter(|l| !l.name.is_empty() && !l.value.is_empty())
        .map(|l| (l.name.clone(), l.value.clone()))
        .collect();

    let ports = template
        .ports
        .iter()
        .map(|p| {
            let (host_ip, host_port) = split_host_port(p.host_port.as_deref());
            PublishedPort {
                host_ip,
                host_port,
                container_port: p.container_port,
                protocol: p.protocol,
            }
        })
        .collect();

    let mut generated = generated_volumes.iter();
    let mut mounts = Vec::with_capacity(template.volumes.len());
    for volume in &template.volumes {
        let (source, is_generated) = if volume.needs_generated_volume() {
            match generated.next() {
                Some(id) => (id.clone(), true),
                None => unreachable!("volume count checked above"),
            }
        } else {
            match volume.bind.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
                Some(bind) => (bind.to_string(), false),
                None => continue,
            }
        };
        // the generated id is consumed even when the declaration has no target
        if volume.container.is_empty() {
            continue;
        }
        mounts.push(Mount {
            source,
            target: volume.container.clone(),
            read_only: volume.readonly,
            generated: is_generated,
        });
    }

    DeploymentConfiguration {
        name: Some(name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        image: image_reference(&template.image, template.registry.as_deref()),
        network_mode: network.name.clone(),
        name_resolution,
        env,
        service_references,
        labels,
        ports,
        extra_hosts: template
            .hosts
            .iter()
            .filter(|h| !h.trim().is_empty())
            .cloned()
            .collect(),
        mounts,
        restart_policy: template.restart_policy,
        privileged: template.privileged,
        interactive: template.interactive,
    }
}

fn split_host_port(host_port: Option<&str>) -> (Option<String>, Option<String>) {
    match host_port.map(str::trim).filter(|h| !h.is_empty()) {
        None => (None, None),
        Some(value) => match value.rsplit_once(':') {
            Some((ip, port)) => (Some(ip.to_string()), Some(port.to_string())),
            None => (None, Some(value.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_untagged_images() {
        assert_eq!(image_reference("nginx", None), "nginx:latest");
        assert_eq!(image_reference("nginx:1.25", None), "nginx:1.25");
        assert_eq!(
            image_reference("team/app", Some("registry.local:5000")),
            "registry.local:5000/team/app:latest"
        );
        assert_eq!(image_reference("app", Some("  ")), "app:latest");
    }

    #[test]
    fn splits_host_ip() {
        assert_eq!(
            split_host_port(Some("127.0.0.1:8080")),
            (Some("127.0.0.1".to_string()), Some("8080".to_string()))
        );
        assert_eq!(split_host_port(Some("8080")), (None, Some("8080".to_string())));
        assert_eq!(split_host_port(Some("")), (None, None));
    }
}
