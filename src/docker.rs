//! Docker CLI engine
//!
//! Implements [`ContainerEngine`] by driving the `docker` command line client.

use crate::builder::{self, DeploymentConfiguration, NameResolution, ServiceReference};
use crate::engine::*;
use crate::{log_debug, log_error, log_info};
use async_trait::async_trait;
use tokio::process::Command;

/// Docker engine driven through its CLI
pub struct DockerCli {
    binary: String,
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn exec<S: AsRef<str>>(&self, args: &[S]) -> Result<CommandOutput> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        log_debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                EngineError::NotAvailable(format!("Failed to execute {}: {}", self.binary, e))
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// `docker create` arguments for a configuration whose service references are already
    /// resolved into `KEY=value` pairs.
    fn build_create_args(config: &DeploymentConfiguration, resolved: &[String]) -> Vec<String> {
        let mut args = vec!["create".to_string()];

        if let Some(name) = &config.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }

        args.push("--network".to_string());
        args.push(config.network_mode.clone());

        for port in &config.ports {
            args.push("-p".to_string());
            let published = match (&port.host_ip, &port.host_port) {
                (Some(ip), Some(host)) => format!("{}:{}:{}", ip, host, port.key()),
                (None, Some(host)) => format!("{}:{}", host, port.key()),
                _ => port.key(),
            };
            args.push(published);
        }

        for bind in config.binds() {
            args.push("-v".to_string());
            args.push(bind);
        }

        for var in config.env.iter().chain(resolved) {
            args.push("-e".to_string());
            args.push(var.clone());
        }

        for (name, value) in &config.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", name, value));
        }

        for host in &config.extra_hosts {
            args.push("--add-host".to_string());
            args.push(host.clone());
        }

        args.push("--restart".to_string());
        args.push(config.restart_policy.as_str().to_string());

        if config.privileged {
            args.push("--privileged".to_string());
        }

        if config.interactive {
            args.push("-i".to_string());
            args.push("-t".to_string());
        }

        args.push(config.image.clone());
        args
    }

    async fn resolve_references(&self, config: &DeploymentConfiguration) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(config.service_references.len());
        for reference in &config.service_references {
            let value = match config.name_resolution {
                NameResolution::ByContainerName => reference.container.clone(),
                NameResolution::ByContainerIp => self.container_ip(reference).await?,
            };
            resolved.push(format!("{}={}", reference.variable, value));
        }
        Ok(resolved)
    }

    async fn container_ip(&self, reference: &ServiceReference) -> Result<String> {
        let output = self
            .exec(&[
                "inspect",
                "--format",
                "{{range .NetworkSettings.Networks}}{{.IPAddress}} {{end}}",
                reference.container.as_str(),
            ])
            .await?;

        if !output.success {
            return Err(EngineError::UnresolvedReference(format!(
                "{}: {}",
                reference.container, output.stderr
            )));
        }

        output
            .stdout
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::UnresolvedReference(format!(
                    "{} has no IP address",
                    reference.container
                ))
            })
    }

    async fn is_attachable(&self, network_id: &str) -> bool {
        match self
            .exec(&["network", "inspect", "--format", "{{.Attachable}}", network_id])
            .await
        {
            Ok(output) => output.success && output.stdout == "true",
            Err(_) => false,
        }
    }

    /// `ID|NAME|DRIVER|SCOPE`
    fn parse_network_line(line: &str) -> Option<Network> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 4 {
            return None;
        }

        Some(Network {
            id: parts[0].to_string(),
            name: parts[1].to_string(),
            driver: parts[2].to_string(),
            scope: NetworkScope::parse(parts[3]),
            attachable: false,
        })
    }

    /// `NAME|DRIVER`
    fn parse_volume_line(line: &str) -> Option<VolumeInfo> {
        let (name, driver) = line.split_once('|')?;
        if name.is_empty() {
            return None;
        }
        Some(VolumeInfo {
            id: name.to_string(),
            driver: driver.to_string(),
        })
    }

    /// `ID|NAMES|IMAGE|STATUS`
    fn parse_ps_line(line: &str) -> Option<ContainerSummary> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 4 {
            return None;
        }

        Some(ContainerSummary {
            id: parts[0].to_string(),
            name: parts[1].to_string(),
            image: parts[2].to_string(),
            status: ContainerStatus::parse(parts[3]),
        })
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    fn name(&self) -> &str {
        "Docker"
    }

    async fn create_anonymous_volumes(&self, count: usize) -> Result<Vec<VolumeInfo>> {
        let mut volumes = Vec::with_capacity(count);
        for _ in 0..count {
            let output = self.exec(&["volume", "create", "--driver", "local"]).await?;
            if !output.success {
                log_error!("docker volume create failed: {}", output.stderr);
                return Err(EngineError::VolumeCreateFailed(output.stderr));
            }
            log_debug!("Created volume {}", output.stdout);
            volumes.push(VolumeInfo {
                id: output.stdout,
                driver: "local".to_string(),
            });
        }
        Ok(volumes)
    }

    async fn pull_image(&self, image: &str, registry: Option<&str>) -> Result<()> {
        let reference = builder::image_reference(image, registry);
        log_info!("Pulling image: {}", reference);

        let output = self.exec(&["pull", reference.as_str()]).await?;
        if !output.success {
            return Err(EngineError::PullFailed {
                image: reference,
                message: output.stderr,
            });
        }
        Ok(())
    }

    async fn create_and_start_container(
        &self,
        config: &DeploymentConfiguration,
    ) -> Result<CreatedContainer> {
        let resolved = self.resolve_references(config).await?;
        let args = Self::build_create_args(config, &resolved);

        log_info!(
            "Creating container {} from {}",
            config.name.as_deref().unwrap_or("<unnamed>"),
            config.image
        );
        let created = self.exec(args.as_slice()).await?;
        if !created.success {
            log_error!("docker create failed: {}", created.stderr);
            return Err(EngineError::CreateFailed(created.stderr));
        }
        let id = created.stdout;

        let started = self.exec(&["start", id.as_str()]).await?;
        if !started.success {
            log_error!("docker start failed: {}", started.stderr);
            return Err(EngineError::StartFailed {
                id,
                message: started.stderr,
            });
        }

        log_info!("Container started: {}", id);
        Ok(CreatedContainer { id })
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        let output = self
            .exec(&[
                "network",
                "ls",
                "--format",
                "{{.ID}}|{{.Name}}|{{.Driver}}|{{.Scope}}",
            ])
            .await?;
        if !output.success {
            return Err(EngineError::Other(output.stderr));
        }

        let mut networks: Vec<Network> = output
            .stdout
            .lines()
            .filter_map(Self::parse_network_line)
            .collect();
        for network in networks.iter_mut().filter(|n| n.scope == NetworkScope::Swarm) {
            network.attachable = self.is_attachable(&network.id).await;
        }
        Ok(networks)
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>> {
        let output = self
            .exec(&["volume", "ls", "--format", "{{.Name}}|{{.Driver}}"])
            .await?;
        if !output.success {
            return Err(EngineError::Other(output.stderr));
        }

        Ok(output
            .stdout
            .lines()
            .filter_map(Self::parse_volume_line)
            .collect())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let mut args = vec![
            "ps",
            "--format",
            "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}",
        ];
        if all {
            args.push("-a");
        }

        let output = self.exec(args.as_slice()).await?;
        if !output.success {
            return Err(EngineError::Other(output.stderr));
        }

        Ok(output
            .stdout
            .lines()
            .filter_map(Self::parse_ps_line)
            .collect())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Mount, PublishedPort};
    use crate::template::{Protocol, RestartPolicy};
    use std::collections::BTreeMap;

    fn configuration() -> DeploymentConfiguration {
        DeploymentConfiguration {
            name: Some("web".to_string()),
            image: "nginx:latest".to_string(),
            network_mode: "frontend".to_string(),
            name_resolution: NameResolution::ByContainerName,
            env: vec!["MODE=prod".to_string()],
            service_references: vec![],
            labels: BTreeMap::from([("team".to_string(), "ops".to_string())]),
            ports: vec![
                PublishedPort {
                    host_ip: Some("127.0.0.1".to_string()),
                    host_port: Some("8080".to_string()),
                    container_port: 80,
                    protocol: Protocol::Tcp,
                },
                PublishedPort {
                    host_ip: None,
                    host_port: None,
                    container_port: 53,
                    protocol: Protocol::Udp,
                },
            ],
            extra_hosts: vec!["db:10.0.0.5".to_string()],
            mounts: vec![Mount {
                source: "abc123".to_string(),
                target: "/data".to_string(),
                read_only: true,
                generated: true,
            }],
            restart_policy: RestartPolicy::UnlessStopped,
            privileged: false,
            interactive: true,
        }
    }

    #[test]
    fn create_args_carry_configuration() {
        let args = DockerCli::build_create_args(&configuration(), &["DB=postgres".to_string()]);
        let joined = args.join(" ");

        assert_eq!(args.first().map(String::as_str), Some("create"));
        assert_eq!(args.last().map(String::as_str), Some("nginx:latest"));
        assert!(joined.contains("--name web"));
        assert!(joined.contains("--network frontend"));
        assert!(joined.contains("-p 127.0.0.1:8080:80/tcp"));
        assert!(joined.contains("-p 53/udp"));
        assert!(joined.contains("-v abc123:/data:ro"));
        assert!(joined.contains("-e MODE=prod"));
        assert!(joined.contains("-e DB=postgres"));
        assert!(joined.contains("--label team=ops"));
        assert!(joined.contains("--add-host db:10.0.0.5"));
        assert!(joined.contains("--restart unless-stopped"));
        assert!(joined.contains("-i -t"));
        assert!(!joined.contains("--privileged"));
    }

    #[test]
    fn parses_listing_lines() {
        let network = DockerCli::parse_network_line("a1b2|bridge|bridge|local").unwrap();
        assert_eq!(network.name, "bridge");
        assert_eq!(network.scope, NetworkScope::Local);
        assert!(DockerCli::parse_network_line("broken").is_none());

        let volume = DockerCli::parse_volume_line("data|local").unwrap();
        assert_eq!(volume.id, "data");

        let container = DockerCli::parse_ps_line("f00|db|postgres:16|Up 3 hours").unwrap();
        assert_eq!(container.name, "db");
        assert_eq!(container.status, ContainerStatus::Running);
    }
}
