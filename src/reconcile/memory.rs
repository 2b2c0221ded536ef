//! In-memory registry used by the reconciler tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::ecr::{RegistryError, RepositoryGateway, RepositoryIdentity};
use crate::policy::{LifecyclePolicy, PolicyDocument};

/// A recorded gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Describe(String),
    Create { name: String, scan_on_push: bool },
    GetPolicy(String),
    SetPolicy(String),
    GetLifecyclePolicy(String),
    SetLifecyclePolicy(String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Create { .. } | Call::SetPolicy(_) | Call::SetLifecyclePolicy(_)
        )
    }
}

type Fault = Box<dyn Fn() -> RegistryError + Send + Sync>;

#[derive(Default)]
struct StoredRepository {
    policy_text: Option<String>,
    lifecycle_text: Option<String>,
}

#[derive(Default)]
struct State {
    repositories: BTreeMap<String, StoredRepository>,
    calls: Vec<Call>,
}

/// Registry that keeps repositories in memory and records every call
///
/// Policies are stored as text, so reads go through the same parsing as
/// documents returned by the real service.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
    describe_fault: Option<Fault>,
    create_fault: Option<Fault>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .repositories
            .insert(name.to_string(), StoredRepository::default());
        self
    }

    pub fn with_policy_text(self, name: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .repositories
            .entry(name.to_string())
            .or_default()
            .policy_text = Some(text.to_string());
        self
    }

    pub fn with_lifecycle_text(self, name: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .repositories
            .entry(name.to_string())
            .or_default()
            .lifecycle_text = Some(text.to_string());
        self
    }

    pub fn fail_describe(
        mut self,
        fault: impl Fn() -> RegistryError + Send + Sync + 'static,
    ) -> Self {
        self.describe_fault = Some(Box::new(fault));
        self
    }

    pub fn fail_create(
        mut self,
        fault: impl Fn() -> RegistryError + Send + Sync + 'static,
    ) -> Self {
        self.create_fault = Some(Box::new(fault));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn policy_text(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .repositories
            .get(name)
            .and_then(|r| r.policy_text.clone())
    }

    pub fn lifecycle_text(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .repositories
            .get(name)
            .and_then(|r| r.lifecycle_text.clone())
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn identity(name: &str) -> RepositoryIdentity {
        RepositoryIdentity {
            name: name.to_string(),
            arn: format!("arn:aws:ecr:eu-central-1:123456789012:repository/{}", name),
            uri: format!("123456789012.dkr.ecr.eu-central-1.amazonaws.com/{}", name),
        }
    }

    fn not_found(name: &str) -> RegistryError {
        RegistryError::RepositoryNotFound {
            repository: name.to_string(),
        }
    }
}

#[async_trait]
impl RepositoryGateway for MemoryGateway {
    async fn describe_repository(&self, name: &str) -> Result<RepositoryIdentity, RegistryError> {
        self.record(Call::Describe(name.to_string()));
        if let Some(fault) = &self.describe_fault {
            return Err(fault());
        }
        if self.state.lock().unwrap().repositories.contains_key(name) {
            Ok(Self::identity(name))
        } else {
            Err(Self::not_found(name))
        }
    }

    async fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> Result<RepositoryIdentity, RegistryError> {
        self.record(Call::Create {
            name: name.to_string(),
            scan_on_push,
        });
        if let Some(fault) = &self.create_fault {
            return Err(fault());
        }
        let mut state = self.state.lock().unwrap();
        if state.repositories.contains_key(name) {
            return Err(RegistryError::Service {
                code: "RepositoryAlreadyExistsException".to_string(),
                message: format!("The repository with name '{}' already exists", name),
            });
        }
        state
            .repositories
            .insert(name.to_string(), StoredRepository::default());
        Ok(Self::identity(name))
    }

    async fn get_policy(&self, name: &str) -> Result<PolicyDocument, RegistryError> {
        self.record(Call::GetPolicy(name.to_string()));
        let text = {
            let state = self.state.lock().unwrap();
            let repository = state
                .repositories
                .get(name)
                .ok_or_else(|| Self::not_found(name))?;
            repository.policy_text.clone()
        };
        let text = text.ok_or_else(|| RegistryError::PolicyNotFound {
            repository: name.to_string(),
        })?;
        PolicyDocument::from_json(&text).map_err(|source| RegistryError::InvalidDocument {
            repository: name.to_string(),
            kind: "repository policy",
            source,
        })
    }

    async fn set_policy(&self, name: &str, policy: &PolicyDocument) -> Result<(), RegistryError> {
        self.record(Call::SetPolicy(name.to_string()));
        let text = policy.to_json().map_err(|source| RegistryError::InvalidDocument {
            repository: name.to_string(),
            kind: "repository policy",
            source,
        })?;
        let mut state = self.state.lock().unwrap();
        let repository = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| Self::not_found(name))?;
        repository.policy_text = Some(text);
        Ok(())
    }

    async fn get_lifecycle_policy(&self, name: &str) -> Result<LifecyclePolicy, RegistryError> {
        self.record(Call::GetLifecyclePolicy(name.to_string()));
        let text = {
            let state = self.state.lock().unwrap();
            let repository = state
                .repositories
                .get(name)
                .ok_or_else(|| Self::not_found(name))?;
            repository.lifecycle_text.clone()
        };
        let text = text.ok_or_else(|| RegistryError::LifecyclePolicyNotFound {
            repository: name.to_string(),
        })?;
        LifecyclePolicy::from_json(&text).map_err(|source| RegistryError::InvalidDocument {
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
        self.record(Call::SetLifecyclePolicy(name.to_string()));
        let text = policy.to_json().map_err(|source| RegistryError::InvalidDocument {
            repository: name.to_string(),
            kind: "lifecycle policy",
            source,
        })?;
        let mut state = self.state.lock().unwrap();
        let repository = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| Self::not_found(name))?;
        repository.lifecycle_text = Some(text);
        Ok(())
    }
}
