use std::fmt;
use tracing::debug;

use crate::policy::document::{PolicyDocument, Principal, Statement, StringList};

/// Placeholder substituted with the account identifier in principal templates
pub const ACCOUNT_ID_PLACEHOLDER: &str = "{account_id}";

pub const DEFAULT_PRINCIPAL_TEMPLATE: &str = "arn:aws:iam::{account_id}:root";
pub const DEFAULT_LAMBDA_SOURCE_TEMPLATE: &str = "arn:aws:lambda:*:{account_id}:function:*";

const CROSS_ACCOUNT_PULL_SID: &str = "AllowCrossAccountPull";
const CROSS_ACCOUNT_PULL_ACTIONS: [&str; 3] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:BatchGetImage",
    "ecr:GetDownloadUrlForLayer",
];

const LAMBDA_SID: &str = "AllowCrossAccountLambdaPull";
const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";
const LAMBDA_ACTIONS: [&str; 2] = ["ecr:BatchGetImage", "ecr:GetDownloadUrlForLayer"];

/// A trusted AWS account identifier
///
/// No format validation beyond being non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Parse a comma-separated list, skipping empty entries
    pub fn parse_list(raw: &str) -> Vec<AccountId> {
        raw.split(',').filter_map(AccountId::new).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secondary statement granting a service principal pull access, scoped by
/// source ARNs derived from the trusted accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccess {
    pub sid: String,
    pub service_principal: String,
    pub actions: Vec<String>,
    pub condition_operator: String,
    pub condition_key: String,
    pub source_template: String,
}

impl ServiceAccess {
    /// Lambda functions in the trusted accounts pulling container images
    pub fn lambda(source_template: impl Into<String>) -> Self {
        Self {
            sid: LAMBDA_SID.to_string(),
            service_principal: LAMBDA_SERVICE_PRINCIPAL.to_string(),
            actions: LAMBDA_ACTIONS.iter().map(|a| a.to_string()).collect(),
            condition_operator: "StringLike".to_string(),
            condition_key: "aws:sourceArn".to_string(),
            source_template: source_template.into(),
        }
    }
}

fn render(template: &str, account: &AccountId) -> String {
    template.replace(ACCOUNT_ID_PLACEHOLDER, account.as_str())
}

/// Sorted, deduplicated identifiers rendered from a template
fn render_sorted(template: &str, accounts: &[AccountId]) -> Vec<String> {
    let mut rendered: Vec<String> = accounts.iter().map(|a| render(template, a)).collect();
    rendered.sort();
    rendered.dedup();
    rendered
}

/// Computes the desired repository access policy
///
/// Output is a pure function of the inputs: the same accounts in any order
/// serialize to identical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyBuilder {
    principal_template: String,
    service_access: Option<ServiceAccess>,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PRINCIPAL_TEMPLATE)
    }
}

impl PolicyBuilder {
    pub fn new(principal_template: impl Into<String>) -> Self {
        Self {
            principal_template: principal_template.into(),
            service_access: None,
        }
    }

    pub fn with_service_access(mut self, access: ServiceAccess) -> Self {
        self.service_access = Some(access);
        self
    }

    /// Build the access policy for a repository
    ///
    /// With no trusted accounts the document has no statements.
    pub fn access_policy(&self, repository: &str, trusted: &[AccountId]) -> PolicyDocument {
        if trusted.is_empty() {
            debug!(
                repository = %repository,
                "No trusted accounts, access policy has no statements"
            );
            return PolicyDocument::new(Vec::new());
        }

        let mut statements = vec![Statement::allow(
            CROSS_ACCOUNT_PULL_SID,
            Principal::of(
                "AWS",
                StringList::Many(render_sorted(&self.principal_template, trusted)),
            ),
            StringList::from_iter(CROSS_ACCOUNT_PULL_ACTIONS),
        )];

        if let Some(access) = &self.service_access {
            statements.push(
                Statement::allow(
                    &access.sid,
                    Principal::of(
                        "Service",
                        StringList::Many(vec![access.service_principal.clone()]),
                    ),
                    access.actions.iter().cloned().collect(),
                )
                .with_condition(
                    &access.condition_operator,
                    &access.condition_key,
                    StringList::Many(render_sorted(&access.source_template, trusted)),
                ),
            );
        }

        debug!(
            repository = %repository,
            accounts = trusted.len(),
            statements = statements.len(),
            "Computed desired access policy"
        );
        PolicyDocument::new(statements)
    }
}
