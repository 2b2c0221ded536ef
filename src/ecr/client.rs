use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ecr::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ecr::types::{ImageScanningConfiguration, Repository};
use aws_sdk_ecr::Client as EcrClient;
use tracing::debug;

use crate::ecr::error::RegistryError;
use crate::ecr::gateway::{RepositoryGateway, RepositoryIdentity};
use crate::policy::{LifecyclePolicy, PolicyDocument};

/// Extract a clean error message from an AWS SDK error's Debug output
///
/// The AWS SDK errors have verbose Debug output, but we can extract just the
/// meaningful message by parsing for the `message: Some("...")` pattern.
fn format_sdk_error<E: std::fmt::Debug>(err: &E) -> String {
    let debug_str = format!("{:?}", err);

    // Pattern: message: Some("actual error message")
    if let Some(start) = debug_str.find("message: Some(\"") {
        let start = start + 15; // length of 'message: Some("'
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    // Fallback: a Message field as found in JSON responses
    if let Some(start) = debug_str.find("\"Message\":\"") {
        let start = start + 11; // length of '"Message":"'
        if let Some(end) = debug_str[start..].find('"') {
            return debug_str[start..start + end].to_string();
        }
    }

    match debug_str.char_indices().nth(200) {
        Some((end, _)) => format!("{}...", &debug_str[..end]),
        None => debug_str,
    }
}

/// Map an SDK error onto the gateway error taxonomy using the service error code
fn classify_sdk_error<E, R>(
    err: SdkError<E, R>,
    operation: &'static str,
    repository: &str,
) -> RegistryError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    let Some(service_err) = err.as_service_error() else {
        return RegistryError::Sdk {
            operation,
            repository: repository.to_string(),
            message: format_sdk_error(&err),
        };
    };

    let message = service_err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format_sdk_error(&err));

    match service_err.code() {
        Some("RepositoryNotFoundException") => RegistryError::RepositoryNotFound {
            repository: repository.to_string(),
        },
        Some("RepositoryPolicyNotFoundException") => RegistryError::PolicyNotFound {
            repository: repository.to_string(),
        },
        Some("LifecyclePolicyNotFoundException") => RegistryError::LifecyclePolicyNotFound {
            repository: repository.to_string(),
        },
        Some("AccessDeniedException") => RegistryError::AccessDenied { message },
        Some(code) => RegistryError::Service {
            code: code.to_string(),
            message,
        },
        None => RegistryError::Sdk {
            operation,
            repository: repository.to_string(),
            message,
        },
    }
}

fn identity_from_repository(
    repository: &Repository,
    name: &str,
) -> Result<RepositoryIdentity, RegistryError> {
    let require = |value: Option<&str>, field: &'static str| {
        value
            .map(str::to_string)
            .ok_or_else(|| RegistryError::IncompleteResponse {
                repository: name.to_string(),
                field,
            })
    };

    Ok(RepositoryIdentity {
        name: require(repository.repository_name(), "repositoryName")?,
        arn: require(repository.repository_arn(), "repositoryArn")?,
        uri: require(repository.repository_uri(), "repositoryUri")?,
    })
}

/// ECR implementation of the repository gateway
///
/// Credentials and region come from the AWS default chain (environment,
/// profile, instance role). An explicit region overrides the chain's region.
pub struct EcrGateway {
    client: EcrClient,
}

impl EcrGateway {
    /// Create a new gateway from the ambient AWS configuration
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let aws_config = loader.load().await;

        Self {
            client: EcrClient::new(&aws_config),
        }
    }
}

#[async_trait]
impl RepositoryGateway for EcrGateway {
    async fn describe_repository(&self, name: &str) -> Result<RepositoryIdentity, RegistryError> {
        let response = self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, "describe repository", name))?;

        match response.repositories().first() {
            Some(repository) => identity_from_repository(repository, name),
            None => Err(RegistryError::RepositoryNotFound {
                repository: name.to_string(),
            }),
        }
    }

    async fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> Result<RepositoryIdentity, RegistryError> {
        let response = self
            .client
            .create_repository()
            .repository_name(name)
            .image_scanning_configuration(
                ImageScanningConfiguration::builder()
                    .scan_on_push(scan_on_push)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, "create repository", name))?;

        let repository = response
            .repository()
            .ok_or_else(|| RegistryError::IncompleteResponse {
                repository: name.to_string(),
                field: "repository",
            })?;

        identity_from_repository(repository, name)
    }

    async fn get_policy(&self, name: &str) -> Result<PolicyDocument, RegistryError> {
        let response = self
            .client
            .get_repository_policy()
            .repository_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, "get repository policy", name))?;

        let text = response
            .policy_text()
            .ok_or_else(|| RegistryError::PolicyNotFound {
                repository: name.to_string(),
            })?;
        debug!(repository = %name, policy = %text, "Fetched repository policy");

        PolicyDocument::from_json(text).map_err(|source| RegistryError::InvalidDocument {
            repository: name.to_string(),
            kind: "repository policy",
            source,
        })
    }

    async fn set_policy(&self, name: &str, policy: &PolicyDocument) -> Result<(), RegistryError> {
        let text = policy
            .to_json()
            .map_err(|source| RegistryError::InvalidDocument {
                repository: name.to_string(),
                kind: "repository policy",
                source,
            })?;

        self.client
            .set_repository_policy()
            .repository_name(name)
            .policy_text(text)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, "set repository policy", name))?;

        Ok(())
    }

    async fn get_lifecycle_policy(&self, name: &str) -> Result<LifecyclePolicy, RegistryError> {
        let response = self
            .client
            .get_lifecycle_policy()
            .repository_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, "get lifecycle policy", name))?;

        let text = response.lifecycle_policy_text().ok_or_else(|| {
            RegistryError::LifecyclePolicyNotFound {
                repository: name.to_string(),
            }
        })?;
        debug!(repository = %name, policy = %text, "Fetched lifecycle policy");

        LifecyclePolicy::from_json(text).map_err(|source| RegistryError::InvalidDocument {
            repository: name.to_string(),
            kind: "lifecycle policy",
            source,
        })
    }

    async fn set_lifecycle_policy(
        &self,
        name: &str,
        policy: &LifecyclePolicy,
    ) -> Result<(), RegistryError> {
        let text = policy
            .to_json()
            .map_err(|source| RegistryError::InvalidDocument {
                repository: name.to_string(),
                kind: "lifecycle policy",
                source,
            })?;

        self.client
            .put_lifecycle_policy()
            .repository_name(name)
            .lifecycle_policy_text(text)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, "put lifecycle policy", name))?;

        Ok(())
    }
}
