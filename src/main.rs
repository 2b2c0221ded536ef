use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod action;
mod ecr;
mod policy;
mod reconcile;
mod settings;

use action::outputs::report_failure;
use action::{resolve_repository_name, ActionOutputs};
use ecr::{EcrGateway, RegistryError};
use reconcile::Reconciler;
use settings::{CliOverrides, Settings, SettingsSources};

/// Environment variable naming the config file when `--config` is not given
const CONFIG_ENV_VAR: &str = "ECR_ENSURE_CONFIG";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: RunArgs,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Ensure the repository exists and reconcile its policies (default)
    Ensure,
    /// Print the desired policies as JSON without contacting AWS
    Render,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// ECR repository name (defaults to the repository of the triggering event)
    #[arg(long, global = true)]
    ecr_name: Option<String>,
    /// Comma-separated AWS account IDs allowed to pull images
    #[arg(long, global = true)]
    trusted_account_ids: Option<String>,
    /// AWS region
    #[arg(long, global = true)]
    region: Option<String>,
    /// Event payload JSON (defaults to GITHUB_EVENT_PATH)
    #[arg(long, global = true)]
    event_path: Option<PathBuf>,
}

impl RunArgs {
    fn config_file(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            ecr_name: self.ecr_name.clone(),
            trusted_account_ids: self.trusted_account_ids.clone(),
            region: self.region.clone(),
            event_path: self.event_path.clone(),
        }
    }
}

/// Title of the `::error` annotation for a failed run
fn failure_title(err: &anyhow::Error) -> String {
    match err.downcast_ref::<RegistryError>() {
        Some(e) => e.name().to_string(),
        None => "Error".to_string(),
    }
}

async fn ensure(settings: &Settings) -> Result<()> {
    let repository =
        resolve_repository_name(settings.ecr_name.as_deref(), settings.event_path.as_deref())?;
    let trusted = settings.trusted_accounts();
    info!(
        "Ensuring ECR repository '{}' ({} trusted account(s))",
        repository,
        trusted.len()
    );

    let gateway = EcrGateway::new(settings.region.clone()).await;
    let reconciler = Reconciler::new(gateway, settings.reconciler_config());
    let report = reconciler.reconcile(&repository, &trusted).await?;
    debug!(transitions = ?report.transitions, "Reconciliation finished");

    info!(
        created = report.created,
        access_policy = ?report.access_policy,
        lifecycle_policy = ?report.lifecycle_policy,
        "ECR repository '{}' is ready: {}",
        report.identity.name,
        report.identity.uri
    );

    ActionOutputs::from_output_file(settings.output_path.clone())
        .report_identity(&report.identity)
        .context("Failed to report step outputs")?;
    Ok(())
}

fn render(settings: &Settings) -> Result<()> {
    let repository =
        resolve_repository_name(settings.ecr_name.as_deref(), settings.event_path.as_deref())?;
    let config = settings.reconciler_config();
    let access_policy = config
        .policy
        .access_policy(&repository, &settings.trusted_accounts());

    let rendered = serde_json::json!({
        "repository": repository,
        "scan_on_push": config.scan_on_push,
        "access_policy": access_policy.has_principals().then_some(&access_policy),
        "lifecycle_policy": config.lifecycle,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

async fn run(command: Commands, args: &RunArgs) -> Result<()> {
    let settings = Settings::load(SettingsSources::from_env(
        args.config_file(),
        args.overrides(),
    ))
    .context("Failed to load configuration")?;

    match command {
        Commands::Ensure => ensure(&settings).await,
        Commands::Render => render(&settings),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries workflow commands and rendered output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Ensure);

    match run(command, &cli.args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            report_failure(&failure_title(&e), &format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_ensure() {
        let cli = Cli::try_parse_from(["ecr-ensure", "--ecr-name", "myrepo"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.args.ecr_name.as_deref(), Some("myrepo"));
    }

    #[test]
    fn test_cli_global_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ecr-ensure",
            "render",
            "--trusted-account-ids",
            "111,222",
            "--region",
            "eu-central-1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Render)));

        let overrides = cli.args.overrides();
        assert_eq!(overrides.trusted_account_ids.as_deref(), Some("111,222"));
        assert_eq!(overrides.region.as_deref(), Some("eu-central-1"));
    }

    #[test]
    fn test_failure_title() {
        let err = anyhow::Error::from(RegistryError::AccessDenied {
            message: "not authorized".to_string(),
        });
        assert_eq!(failure_title(&err), "AccessDenied");

        let err = anyhow::anyhow!("No ECR repository name given");
        assert_eq!(failure_title(&err), "Error");
    }
}
