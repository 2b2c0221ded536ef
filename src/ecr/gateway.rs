use async_trait::async_trait;

use crate::ecr::error::RegistryError;
use crate::policy::{LifecyclePolicy, PolicyDocument};

/// Identity of an ECR repository as assigned by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryIdentity {
    /// Repository name (unique within the registry)
    pub name: String,
    /// Repository ARN
    pub arn: String,
    /// Repository URI used to push and pull images
    pub uri: String,
}

/// Trait for the registry operations consumed by the reconciler
///
/// Every method is a single remote call. Absence is reported through the
/// dedicated `RegistryError` variants (`RepositoryNotFound`, `PolicyNotFound`,
/// `LifecyclePolicyNotFound`) so callers can tell it apart from failures.
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Describe a repository by name
    async fn describe_repository(&self, name: &str) -> Result<RepositoryIdentity, RegistryError>;

    /// Create a repository
    ///
    /// Must only be called after `describe_repository` reported absence.
    async fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> Result<RepositoryIdentity, RegistryError>;

    /// Get the repository access policy
    async fn get_policy(&self, name: &str) -> Result<PolicyDocument, RegistryError>;

    /// Replace the repository access policy
    async fn set_policy(&self, name: &str, policy: &PolicyDocument) -> Result<(), RegistryError>;

    /// Get the repository lifecycle policy
    async fn get_lifecycle_policy(&self, name: &str) -> Result<LifecyclePolicy, RegistryError>;

    /// Replace the repository lifecycle policy
    async fn set_lifecycle_policy(
        &self,
        name: &str,
        policy: &LifecyclePolicy,
    ) -> Result<(), RegistryError>;
}
