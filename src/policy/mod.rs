pub mod builder;
pub mod compare;
pub mod document;
pub mod lifecycle;

pub use builder::{
    AccountId, PolicyBuilder, ServiceAccess, ACCOUNT_ID_PLACEHOLDER, DEFAULT_LAMBDA_SOURCE_TEMPLATE,
    DEFAULT_PRINCIPAL_TEMPLATE,
};
pub use compare::equivalent;
pub use document::PolicyDocument;
pub use lifecycle::{LifecyclePolicy, DEFAULT_UNTAGGED_EXPIRY_DAYS};
