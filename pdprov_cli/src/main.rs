use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use pdprov_cli::config::{AppConfig, ConfigManager, get_config};
use pdprov_cli::error::{CliError, CliResult, ExitCode};
use pdprov_cli::gate::select_gate;
use pdprov_cli::orchestrators::OutputFormat;
use pdprov_cli::orchestrators::import_orchestrator::{ImportOptions, ImportOrchestrator};
use pdprov_cli::orchestrators::subscription_orchestrator::SubscriptionOrchestrator;
use pdprov_cli::terminal;
use pdprov_core::inventory::DEFAULT_ACTIVATION_FILE;
use pdprov_core::{ReaderMode, RestDirectoryClient};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pdprov")]
#[command(author, version, about = "Bulk provisioning of users, teams and notification rules", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Append log records to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the users listed in a CSV file
    Import {
        /// CSV file with one user per row
        path: PathBuf,

        /// The first row names the columns
        #[arg(long)]
        has_headers: bool,

        /// Create teams that do not exist yet
        #[arg(long, conflicts_with = "no_create_teams")]
        create_teams: bool,

        /// Skip teams that do not exist yet
        #[arg(long)]
        no_create_teams: bool,

        /// Answer yes to every confirmation
        #[arg(short, long)]
        yes: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: FormatArg,
    },

    /// Manage webhook subscriptions
    Subscriptions {
        #[command(subcommand)]
        command: SubscriptionCommand,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SubscriptionCommand {
    /// Write inactive subscriptions to an activation file
    Export {
        /// Activation file to write
        #[arg(short, long, value_name = "CSV")]
        output: Option<PathBuf>,

        /// Offer to activate the exported subscriptions
        #[arg(long)]
        activate: bool,

        /// Answer yes to every confirmation
        #[arg(short, long)]
        yes: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: FormatArg,
    },

    /// Activate every subscription listed in an activation file
    Activate {
        /// Activation file with a subscription_id column
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: FormatArg,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., directory.api_base_url)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., import.create_missing_teams)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Print the configuration file path
    Path,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug;

    if let Err(e) = init_logging(debug, cli.log_file.as_deref()) {
        let error = CliError::filesystem(&format!("{e:#}"));
        eprint!("{}", error.format_for_user(debug));
        return error.exit_code().into();
    }

    match run(cli).await {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            log::error!("{error}");
            eprint!("{}", error.format_for_user(debug));
            error.exit_code().into()
        }
    }
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_filter = if log_file.is_some() { "info" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    if debug {
        builder
            .filter_module("pdprov_core", log::LevelFilter::Debug)
            .filter_module("pdprov_cli", log::LevelFilter::Debug)
            .filter_module("pdprov", log::LevelFilter::Debug)
            .format_timestamp_millis();
    }

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .write_style(env_logger::WriteStyle::Never);
    }

    builder.init();
    if debug {
        eprintln!("Debug logging enabled");
    }
    Ok(())
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Import {
            path,
            has_headers,
            create_teams,
            no_create_teams,
            yes,
            format,
        } => {
            let config = load_config()?;
            let create_teams = match (create_teams, no_create_teams) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            import_command(config, path, has_headers, create_teams, yes, format.into()).await
        }
        Commands::Subscriptions { command } => {
            let config = load_config()?;
            subscriptions_command(config, command).await
        }
        Commands::Config { command } => config_command(command),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

fn load_config() -> CliResult<AppConfig> {
    let config = get_config()?;
    if !config.output.color_enabled || !terminal::supports_ansi() {
        colored::control::set_override(false);
    }
    Ok(config)
}

async fn import_command(
    config: AppConfig,
    path: PathBuf,
    has_headers: bool,
    create_teams: Option<bool>,
    yes: bool,
    format: OutputFormat,
) -> CliResult<()> {
    log::debug!("Starting import of {}", path.display());

    let context = config.run_context();
    let client = Arc::new(RestDirectoryClient::new(
        config.rest_client_config()?,
        context.clone(),
    )?);

    let mut engine_config = config.engine_config();
    if let Some(create) = create_teams {
        engine_config.create_missing_teams = create;
    }

    let options = ImportOptions {
        path,
        mode: ReaderMode::from_has_headers(has_headers || config.import.has_headers),
        format,
    };

    ImportOrchestrator::new(client, select_gate(yes), engine_config, context, options)
        .run()
        .await?;
    Ok(())
}

async fn subscriptions_command(config: AppConfig, command: SubscriptionCommand) -> CliResult<()> {
    let context = config.run_context();
    let client = Arc::new(RestDirectoryClient::new(
        config.rest_client_config()?,
        context.clone(),
    )?);

    match command {
        SubscriptionCommand::Export {
            output,
            activate,
            yes,
            format,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_ACTIVATION_FILE));
            let gate = select_gate(yes);
            SubscriptionOrchestrator::new(client, context, format.into())
                .export(&output, activate, gate.as_ref())
                .await?;
        }
        SubscriptionCommand::Activate { path, format } => {
            SubscriptionOrchestrator::new(client, context, format.into())
                .activate(&path)
                .await?;
        }
    }
    Ok(())
}

fn config_command(command: ConfigCommand) -> CliResult<()> {
    let mut manager = ConfigManager::new();

    match command {
        ConfigCommand::Get { key } => {
            println!("{}", manager.get(&key)?);
        }
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value)?;
            let shown = if key == "directory.api_token" { "***" } else { value.as_str() };
            eprintln!("{}", format!("Set {key} = {shown}").green());
            eprintln!(
                "Configuration saved to: {}",
                manager.get_config_path().display()
            );
        }
        ConfigCommand::List => {
            let items = manager.list()?;
            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();

            let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            for (key, value) in items {
                let (section, field) = key.split_once('.').unwrap_or(("general", key.as_str()));
                sections
                    .entry(section.to_string())
                    .or_default()
                    .push((field.to_string(), value));
            }

            for (section, items) in sections {
                println!("[{}]", section.yellow());
                for (field, value) in items {
                    println!("  {} = {}", field.cyan(), value);
                }
                println!();
            }
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
