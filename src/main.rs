use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use dockyard::{
    TemplateType, TemplatesView,
    access::{AccessControlData, FileOwnershipStore, Ownership},
    catalog::{CatalogKey, HttpCatalog},
    config::DockyardConfig,
    docker::DockerCli,
    engine::ContainerEngine,
    logger,
    notify::ConsoleNotifier,
    pipeline::DeployError,
    stack::GitStackService,
    view::Collaborators,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Template-driven container and stack deployment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template catalog to use (containers or linuxserver.io)
    #[arg(short, long, default_value = "containers")]
    key: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the template catalog
    Templates {
        #[command(subcommand)]
        template_command: TemplateCommands,
    },
    /// List networks available for deployment
    Networks,
    /// Deploy a template
    Deploy {
        /// Template index, as shown by `templates list`
        index: usize,
        /// Container or stack name
        #[arg(short, long)]
        name: Option<String>,
        /// Network to attach the container to
        #[arg(long)]
        network: Option<String>,
        /// Who may access the deployed resources
        #[arg(long, value_enum, default_value = "private")]
        ownership: OwnershipArg,
        /// Authorized user id (restricted ownership)
        #[arg(long = "user-id")]
        users: Vec<u64>,
        /// Authorized team id (restricted ownership)
        #[arg(long = "team-id")]
        teams: Vec<u64>,
        /// Skip access control; the resources are visible to everyone
        #[arg(long)]
        public: bool,
        /// Override a template variable, NAME=VALUE
        #[arg(short, long = "env", value_parser = parse_env_override)]
        env: Vec<(String, String)>,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List templates
    List {
        /// Template type
        #[arg(short = 't', long = "type", value_enum)]
        template_type: Option<TypeArg>,
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List the categories of a template type
    Categories {
        #[arg(short = 't', long = "type", value_enum)]
        template_type: Option<TypeArg>,
    },
    /// Show template details
    Show {
        /// Template index
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TypeArg {
    Container,
    Stack,
}

impl From<TypeArg> for TemplateType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Container => TemplateType::Container,
            TypeArg::Stack => TemplateType::Stack,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OwnershipArg {
    Administrators,
    Private,
    Restricted,
}

impl From<OwnershipArg> for Ownership {
    fn from(arg: OwnershipArg) -> Self {
        match arg {
            OwnershipArg::Administrators => Ownership::Administrators,
            OwnershipArg::Private => Ownership::Private,
            OwnershipArg::Restricted => Ownership::Restricted,
        }
    }
}

fn parse_env_override(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        unsafe {
            std::env::set_var("RUST_LOG", "dockyard=debug");
        }
    }
    logger::init_logger();

    let config_path = cli.config.clone().unwrap_or_else(DockyardConfig::default_path);
    let config = if config_path.exists() {
        DockyardConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        logger::warn!(
            "Configuration not found at {}, using defaults",
            config_path.display()
        );
        DockyardConfig::default()
    };

    let key: CatalogKey = cli.key.parse()?;
    let engine = Arc::new(DockerCli::new(config.docker.binary.clone()));
    if !engine.is_available().await {
        logger::warn!("{} CLI is not available", engine.name());
    }

    let services = Collaborators {
        catalog: Arc::new(HttpCatalog::new(config.templates_url.clone())?),
        engine,
        stacks: Arc::new(GitStackService::new(
            config.git.binary.clone(),
            config.docker.binary.clone(),
            config.stack_workdir(),
        )),
        ownership: Arc::new(FileOwnershipStore::new(config.ownership_store_path())),
        settings: Arc::new(config.clone()),
        notifier: Arc::new(ConsoleNotifier),
    };

    let mut view = TemplatesView::init(
        services,
        key,
        config.endpoint.clone(),
        config.user.details(),
    )
    .await;

    match cli.command {
        Commands::Templates { template_command } => match template_command {
            TemplateCommands::List {
                template_type,
                category,
            } => {
                if let Some(template_type) = template_type {
                    view.update_categories(template_type.into());
                }
                view.state.filters.category = category;

                println!(
                    "{:<6} {:<10} {:<30} {}",
                    "INDEX", "TYPE", "TITLE", "CATEGORIES"
                );
                println!("{}", "=".repeat(80));
                for template in view.filtered_templates() {
                    println!(
                        "{:<6} {:<10} {:<30} {}",
                        template.index,
                        template.template_type,
                        template.title,
                        template.categories.join(", ")
                    );
                }
            }
            TemplateCommands::Categories { template_type } => {
                if let Some(template_type) = template_type {
                    view.update_categories(template_type.into());
                }
                for category in view.available_categories() {
                    println!("{}", category);
                }
            }
            TemplateCommands::Show { index } => {
                let Some(template) = view.templates().get(index) else {
                    bail!("Template #{} not found", index);
                };
                println!("Template: {}", template.title);
                println!("Type: {}", template.template_type);
                if !template.description.is_empty() {
                    println!("Description: {}", template.description);
                }
                println!("Categories: {}", template.categories.join(", "));
                if template.is_stack() {
                    if let Some(repo) = &template.repository {
                        println!("Repository: {} ({})", repo.url, repo.stackfile);
                    }
                } else {
                    println!("Image: {}", template.image);
                    if let Some(network) = &template.network {
                        println!("Network: {}", network);
                    }
                }

                if !template.ports.is_empty() {
                    println!("\nPorts:");
                    for port in &template.ports {
                        println!(
                            "  - {} -> {}/{}",
                            port.host_port.as_deref().unwrap_or("auto"),
                            port.container_port,
                            port.protocol.as_str()
                        );
                    }
                }

                if !template.volumes.is_empty() {
                    println!("\nVolumes:");
                    for volume in &template.volumes {
                        match &volume.bind {
                            Some(bind) => println!("  - {} <- {}", volume.container, bind),
                            None => println!("  - {} (generated)", volume.container),
                        }
                    }
                }

                if !template.env.is_empty() {
                    println!("\nEnvironment:");
                    for var in &template.env {
                        println!(
                            "  - {}={}",
                            var.name,
                            var.effective_value().unwrap_or("")
                        );
                    }
                }
            }
        },
        Commands::Networks => {
            println!("{:<14} {:<24} {:<10} {}", "ID", "NAME", "DRIVER", "SCOPE");
            println!("{}", "-".repeat(60));
            for network in view.available_networks() {
                println!(
                    "{:<14} {:<24} {:<10} {:?}",
                    network.id.chars().take(12).collect::<String>(),
                    network.name,
                    network.driver,
                    network.scope
                );
            }
        }
        Commands::Deploy {
            index,
            name,
            network,
            ownership,
            users,
            teams,
            public,
            env,
        } => {
            view.select_template(index)?;

            if let Some(name) = name {
                view.state.form.name = name;
            }
            if let Some(network) = network {
                let Some(found) = view
                    .available_networks()
                    .iter()
                    .find(|n| n.name == network)
                    .cloned()
                else {
                    bail!("Network '{}' is not available", network);
                };
                view.state.form.network = Some(found);
            }

            if let Some(template) = view.state.selected_mut() {
                for (key, value) in env {
                    match template.env.iter_mut().find(|var| var.name == key) {
                        Some(var) => var.set = Some(value),
                        None => bail!("Template has no variable '{}'", key),
                    }
                }
            }

            view.state.form.access_control = if public {
                AccessControlData::public()
            } else {
                AccessControlData {
                    enabled: true,
                    ownership: ownership.into(),
                    authorized_users: users,
                    authorized_teams: teams,
                }
            };

            match view.create_template().await {
                Ok(outcome) => {
                    println!("📦 {} {}", outcome.kind, outcome.resource_id);
                    for volume in &outcome.generated_volumes {
                        println!("   volume {}", volume);
                    }
                }
                Err(DeployError::Validation(message)) => bail!("{}", message),
                Err(e) => {
                    if let Some(left) = e.left_behind().filter(|l| !l.is_empty()) {
                        eprintln!("Resources left in place: {:?}", left);
                    }
                    bail!("Deployment failed: {}", e);
                }
            }
        }
    }

    Ok(())
}
