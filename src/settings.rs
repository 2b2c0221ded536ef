use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::action::ActionInputs;
use crate::policy::{
    AccountId, LifecyclePolicy, PolicyBuilder, ServiceAccess, ACCOUNT_ID_PLACEHOLDER,
    DEFAULT_LAMBDA_SOURCE_TEMPLATE, DEFAULT_PRINCIPAL_TEMPLATE, DEFAULT_UNTAGGED_EXPIRY_DAYS,
};
use crate::reconcile::ReconcilerConfig;

/// Prefix of environment variables read as settings (`ECR_ENSURE__LIFECYCLE__ENABLED`)
pub const ENV_PREFIX: &str = "ECR_ENSURE";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Repository name; defaults to the repository of the triggering event
    #[serde(default)]
    pub ecr_name: Option<String>,

    /// Comma-separated AWS account IDs allowed to pull from the repository
    #[serde(default)]
    pub trusted_account_ids: String,

    /// AWS region; the default AWS chain decides when unset
    #[serde(default)]
    pub region: Option<String>,

    /// Enable image scanning on push for newly created repositories
    #[serde(default)]
    pub scan_on_push: bool,

    /// Event payload providing the default repository name (GITHUB_EVENT_PATH)
    #[serde(default)]
    pub event_path: Option<PathBuf>,

    /// File receiving step outputs (GITHUB_OUTPUT)
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    #[serde(default)]
    pub policy: PolicySettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicySettings {
    /// Principal ARN template for trusted accounts
    #[serde(default = "default_principal_template")]
    pub principal_template: String,

    /// Also allow Lambda functions in the trusted accounts to pull images
    #[serde(default)]
    pub lambda_access: bool,

    /// Source ARN template for the Lambda statement condition
    #[serde(default = "default_lambda_source_template")]
    pub lambda_source_template: String,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            principal_template: default_principal_template(),
            lambda_access: false,
            lambda_source_template: default_lambda_source_template(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleSettings {
    /// Manage the repository lifecycle policy
    #[serde(default)]
    pub enabled: bool,

    /// Age in days after which untagged images expire (default: 14)
    #[serde(default = "default_untagged_expiry_days")]
    pub untagged_expiry_days: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            untagged_expiry_days: default_untagged_expiry_days(),
        }
    }
}

fn default_principal_template() -> String {
    DEFAULT_PRINCIPAL_TEMPLATE.to_string()
}

fn default_lambda_source_template() -> String {
    DEFAULT_LAMBDA_SOURCE_TEMPLATE.to_string()
}

fn default_untagged_expiry_days() -> u32 {
    DEFAULT_UNTAGGED_EXPIRY_DAYS
}

/// Values given on the command line; they take precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub ecr_name: Option<String>,
    pub trusted_account_ids: Option<String>,
    pub region: Option<String>,
    pub event_path: Option<PathBuf>,
}

/// Everything settings are read from
///
/// Nothing here reads the process environment; `from_env` captures it once.
#[derive(Debug, Clone, Default)]
pub struct SettingsSources {
    pub config_file: Option<PathBuf>,
    pub environment: config::Map<String, String>,
    pub inputs: ActionInputs,
    pub cli: CliOverrides,
}

impl SettingsSources {
    pub fn from_env(config_file: Option<PathBuf>, cli: CliOverrides) -> Self {
        Self {
            config_file,
            environment: std::env::vars().collect(),
            inputs: ActionInputs::from_env(),
            cli,
        }
    }
}

fn input_error(err: anyhow::Error) -> ConfigError {
    ConfigError::Message(format!("{:#}", err))
}

impl Settings {
    /// Load settings, lowest to highest precedence:
    /// defaults, config file, `ECR_ENSURE__*` variables, action inputs, CLI flags
    pub fn load(sources: SettingsSources) -> Result<Self, ConfigError> {
        let SettingsSources {
            config_file,
            environment,
            inputs,
            cli,
        } = sources;

        let mut builder = Config::builder();

        // Paths provided by the GitHub runner
        if let Some(path) = environment.get("GITHUB_EVENT_PATH") {
            builder = builder.set_default("event_path", path.as_str())?;
        }
        if let Some(path) = environment.get("GITHUB_OUTPUT") {
            builder = builder.set_default("output_path", path.as_str())?;
        }

        if let Some(path) = &config_file {
            tracing::info!("Loading config file: {}", path.display());
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(Some(environment)),
            )
            // GitHub Action inputs
            .set_override_option("ecr_name", inputs.get("ecr-name"))?
            .set_override_option("trusted_account_ids", inputs.get("trusted-account-ids"))?
            .set_override_option("region", inputs.get("aws-region"))?
            .set_override_option(
                "scan_on_push",
                inputs.get_bool("scan-on-push").map_err(input_error)?,
            )?
            .set_override_option(
                "policy.lambda_access",
                inputs.get_bool("lambda-access").map_err(input_error)?,
            )?
            .set_override_option(
                "lifecycle.enabled",
                inputs.get_bool("manage-lifecycle").map_err(input_error)?,
            )?
            .set_override_option(
                "lifecycle.untagged_expiry_days",
                inputs
                    .get_u32("lifecycle-untagged-days")
                    .map_err(input_error)?
                    .map(i64::from),
            )?
            // Command line
            .set_override_option("ecr_name", cli.ecr_name)?
            .set_override_option("trusted_account_ids", cli.trusted_account_ids)?
            .set_override_option("region", cli.region)?
            .set_override_option(
                "event_path",
                cli.event_path.map(|p| p.to_string_lossy().into_owned()),
            )?;

        let config = builder.build()?;

        // Deserialize and collect unused fields
        let mut unused_fields = Vec::new();
        let settings: Settings = serde_ignored::deserialize(config, |path| {
            unused_fields.push(path.to_string());
        })?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field: {}", field);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Self::validate_format_string(
            &self.policy.principal_template,
            "policy.principal_template",
            ACCOUNT_ID_PLACEHOLDER,
        )?;
        if self.policy.lambda_access {
            Self::validate_format_string(
                &self.policy.lambda_source_template,
                "policy.lambda_source_template",
                ACCOUNT_ID_PLACEHOLDER,
            )?;
        }
        if self.lifecycle.enabled && self.lifecycle.untagged_expiry_days == 0 {
            return Err(ConfigError::Message(
                "lifecycle.untagged_expiry_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate that a format string contains the required placeholder
    fn validate_format_string(
        format_str: &str,
        field_name: &str,
        required_placeholder: &str,
    ) -> Result<(), ConfigError> {
        if !format_str.contains(required_placeholder) {
            return Err(ConfigError::Message(format!(
                "Configuration error: '{}' must contain '{}' placeholder. Got: '{}'",
                field_name, required_placeholder, format_str
            )));
        }
        Ok(())
    }

    pub fn trusted_accounts(&self) -> Vec<AccountId> {
        AccountId::parse_list(&self.trusted_account_ids)
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        let mut policy = PolicyBuilder::new(self.policy.principal_template.clone());
        if self.policy.lambda_access {
            policy = policy.with_service_access(ServiceAccess::lambda(
                self.policy.lambda_source_template.clone(),
            ));
        }

        ReconcilerConfig {
            scan_on_push: self.scan_on_push,
            policy,
            lifecycle: self
                .lifecycle
                .enabled
                .then(|| LifecyclePolicy::expire_untagged(self.lifecycle.untagged_expiry_days)),
        }
    }
}
