use tracing::{debug, error, info};

use crate::ecr::{RegistryError, RepositoryGateway, RepositoryIdentity};
use crate::policy::{equivalent, AccountId, LifecyclePolicy, PolicyBuilder, PolicyDocument};
use crate::reconcile::state_machine::{validate_transition, ReconcileState};

/// Options of a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// Enable image scanning on push for newly created repositories
    pub scan_on_push: bool,
    /// Computes the desired access policy
    pub policy: PolicyBuilder,
    /// Lifecycle policy to enforce, `None` leaves lifecycle untouched
    pub lifecycle: Option<LifecyclePolicy>,
}

/// What happened to a managed policy during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyChange {
    /// The stored policy was replaced
    Applied,
    /// The stored policy already matched
    Unchanged,
    /// Nothing to manage (no trusted accounts, or lifecycle disabled)
    Skipped,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub identity: RepositoryIdentity,
    pub created: bool,
    pub access_policy: PolicyChange,
    pub lifecycle_policy: PolicyChange,
    pub transitions: Vec<ReconcileState>,
}

/// Tracks the state of one run
struct Run<'a> {
    repository: &'a str,
    state: ReconcileState,
    trail: Vec<ReconcileState>,
}

impl<'a> Run<'a> {
    fn new(repository: &'a str) -> Self {
        Self {
            repository,
            state: ReconcileState::Start,
            trail: vec![ReconcileState::Start],
        }
    }

    fn advance(&mut self, to: ReconcileState) {
        debug_assert!(
            validate_transition(&self.state, &to).is_ok(),
            "invalid transition {} -> {}",
            self.state,
            to
        );
        debug!(repository = %self.repository, from = %self.state, to = %to, "State transition");
        self.state = to;
        self.trail.push(to);
    }
}

/// Ensures a repository exists and its policies match the desired state
///
/// The run is strictly sequential: describe, create if absent, then
/// reconcile the access policy and (if configured) the lifecycle policy.
/// Only absence errors are interpreted; every other gateway error aborts the
/// run unchanged. A repository created before a later failure is kept.
pub struct Reconciler<G> {
    gateway: G,
    config: ReconcilerConfig,
}

impl<G: RepositoryGateway> Reconciler<G> {
    pub fn new(gateway: G, config: ReconcilerConfig) -> Self {
        Self { gateway, config }
    }

    /// Run one reconciliation for `repository` trusting `trusted` accounts
    pub async fn reconcile(
        &self,
        repository: &str,
        trusted: &[AccountId],
    ) -> Result<ReconcileReport, RegistryError> {
        let mut run = Run::new(repository);

        match self.converge(&mut run, trusted).await {
            Ok((identity, created, access_policy, lifecycle_policy)) => {
                run.advance(ReconcileState::Done);
                Ok(ReconcileReport {
                    identity,
                    created,
                    access_policy,
                    lifecycle_policy,
                    transitions: run.trail,
                })
            }
            Err(e) => {
                let failed_in = run.state;
                run.advance(ReconcileState::Failed);
                error!(
                    repository = %repository,
                    state = %failed_in,
                    error_name = e.name(),
                    "Reconciliation failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    async fn converge(
        &self,
        run: &mut Run<'_>,
        trusted: &[AccountId],
    ) -> Result<(RepositoryIdentity, bool, PolicyChange, PolicyChange), RegistryError> {
        let (identity, created) = self.ensure_repository(run).await?;

        run.advance(ReconcileState::ReconcilingPolicy);
        let access_policy = self.reconcile_access_policy(run.repository, trusted).await?;
        let lifecycle_policy = self.reconcile_lifecycle_policy(run.repository).await?;

        Ok((identity, created, access_policy, lifecycle_policy))
    }

    async fn ensure_repository(
        &self,
        run: &mut Run<'_>,
    ) -> Result<(RepositoryIdentity, bool), RegistryError> {
        let name = run.repository;

        run.advance(ReconcileState::CheckingExistence);
        info!("Checking ECR repository '{}'", name);

        match self.gateway.describe_repository(name).await {
            Ok(identity) => {
                info!("ECR repository '{}' already exists", name);
                run.advance(ReconcileState::Exists);
                Ok((identity, false))
            }
            Err(RegistryError::RepositoryNotFound { .. }) => {
                info!("ECR repository '{}' does not exist", name);
                run.advance(ReconcileState::Creating);

                info!("Creating ECR repository '{}'", name);
                let identity = self
                    .gateway
                    .create_repository(name, self.config.scan_on_push)
                    .await?;
                info!("Created ECR repository '{}'", identity.name);
                Ok((identity, true))
            }
            Err(e) => Err(e),
        }
    }

    async fn reconcile_access_policy(
        &self,
        name: &str,
        trusted: &[AccountId],
    ) -> Result<PolicyChange, RegistryError> {
        let desired = self.config.policy.access_policy(name, trusted);

        let current = match self.gateway.get_policy(name).await {
            Ok(policy) => Some(policy),
            Err(RegistryError::PolicyNotFound { .. }) => {
                debug!(repository = %name, "No repository policy stored");
                None
            }
            Err(e) => return Err(e),
        };

        let compare = |current: &PolicyDocument| {
            equivalent(current, &desired).map_err(|source| RegistryError::InvalidDocument {
                repository: name.to_string(),
                kind: "repository policy",
                source,
            })
        };

        if let Some(current) = &current {
            if compare(current)? {
                info!("Repository policy of '{}' is up to date", name);
                return Ok(PolicyChange::Unchanged);
            }
        }

        if !desired.has_principals() {
            if current.is_some() {
                info!(
                    "No trusted accounts configured, \
                     leaving existing repository policy of '{}' in place",
                    name
                );
            } else {
                debug!(
                    repository = %name,
                    "No trusted accounts configured, no repository policy to apply"
                );
            }
            return Ok(PolicyChange::Skipped);
        }

        debug!(
            repository = %name,
            principals = ?desired.principals("AWS"),
            current = current.is_some(),
            "Repository policy differs"
        );
        info!(
            "Setting repository policy on '{}' for {} trusted account(s)",
            name,
            trusted.len()
        );
        self.gateway.set_policy(name, &desired).await?;

        Ok(PolicyChange::Applied)
    }

    async fn reconcile_lifecycle_policy(&self, name: &str) -> Result<PolicyChange, RegistryError> {
        let Some(desired) = &self.config.lifecycle else {
            return Ok(PolicyChange::Skipped);
        };

        let current = match self.gateway.get_lifecycle_policy(name).await {
            Ok(policy) => Some(policy),
            Err(RegistryError::LifecyclePolicyNotFound { .. }) => {
                debug!(repository = %name, "No lifecycle policy stored");
                None
            }
            Err(e) => return Err(e),
        };

        let unchanged = match &current {
            Some(current) => {
                equivalent(current, desired).map_err(|source| RegistryError::InvalidDocument {
                    repository: name.to_string(),
                    kind: "lifecycle policy",
                    source,
                })?
            }
            None => false,
        };
        if unchanged {
            info!("Lifecycle policy of '{}' is up to date", name);
            return Ok(PolicyChange::Unchanged);
        }

        info!("Setting lifecycle policy on '{}'", name);
        self.gateway.set_lifecycle_policy(name, desired).await?;

        Ok(PolicyChange::Applied)
    }
}

#[cfg(test)]
impl<G> Reconciler<G> {
    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}
