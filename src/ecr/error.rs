use thiserror::Error;

/// Errors returned by the registry gateway.
///
/// Only `RepositoryNotFound`, `PolicyNotFound` and `LifecyclePolicyNotFound`
/// are interpreted by the reconciler. Everything else aborts the run.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("ECR repository '{repository}' does not exist")]
    RepositoryNotFound { repository: String },

    #[error("ECR repository '{repository}' has no repository policy")]
    PolicyNotFound { repository: String },

    #[error("ECR repository '{repository}' has no lifecycle policy")]
    LifecyclePolicyNotFound { repository: String },

    #[error("{message}")]
    AccessDenied { message: String },

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Invalid {kind} document stored on ECR repository '{repository}': {source}")]
    InvalidDocument {
        repository: String,
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Incomplete response from ECR for repository '{repository}': missing {field}")]
    IncompleteResponse {
        repository: String,
        field: &'static str,
    },

    #[error("Failed to {operation} for ECR repository '{repository}': {message}")]
    Sdk {
        operation: &'static str,
        repository: String,
        message: String,
    },
}

impl RegistryError {
    /// Short error name reported to the pipeline
    pub fn name(&self) -> &str {
        match self {
            RegistryError::RepositoryNotFound { .. } => "RepositoryNotFound",
            RegistryError::PolicyNotFound { .. } => "PolicyNotFound",
            RegistryError::LifecyclePolicyNotFound { .. } => "LifecyclePolicyNotFound",
            RegistryError::AccessDenied { .. } => "AccessDenied",
            RegistryError::Service { code, .. } => code,
            RegistryError::InvalidDocument { .. } => "InvalidDocument",
            RegistryError::IncompleteResponse { .. } => "IncompleteResponse",
            RegistryError::Sdk { .. } => "SdkError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_surfaces_message_verbatim() {
        let err = RegistryError::AccessDenied {
            message: "User: arn:aws:iam::123:user/ci is not authorized to perform: ecr:DescribeRepositories".to_string(),
        };
        assert_eq!(err.name(), "AccessDenied");
        assert_eq!(
            err.to_string(),
            "User: arn:aws:iam::123:user/ci is not authorized to perform: ecr:DescribeRepositories"
        );
    }

    #[test]
    fn test_service_error_name_is_service_code() {
        let err = RegistryError::Service {
            code: "RepositoryAlreadyExistsException".to_string(),
            message: "The repository already exists".to_string(),
        };
        assert_eq!(err.name(), "RepositoryAlreadyExistsException");
    }

    #[test]
    fn test_absence_variant_names() {
        let repository = "myrepo".to_string();
        assert_eq!(
            RegistryError::RepositoryNotFound {
                repository: repository.clone()
            }
            .name(),
            "RepositoryNotFound"
        );
        assert_eq!(
            RegistryError::PolicyNotFound {
                repository: repository.clone()
            }
            .name(),
            "PolicyNotFound"
        );
        assert_eq!(
            RegistryError::LifecyclePolicyNotFound { repository }.name(),
            "LifecyclePolicyNotFound"
        );
    }
}
