use serde::Serialize;

use crate::policy::document::PolicyDocument;
use crate::policy::lifecycle::LifecyclePolicy;

/// Documents with a representation-independent normal form
///
/// The canonical form orders map keys (all maps are `BTreeMap`s and struct
/// fields serialize in declaration order) and sorts every list that IAM
/// treats as a set. Whitespace is gone once parsed.
pub trait Canonical: Serialize + Sized {
    fn canonicalize(&self) -> Result<Self, serde_json::Error>;

    fn canonical_form(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.canonicalize()?)
    }
}

impl Canonical for PolicyDocument {
    fn canonicalize(&self) -> Result<Self, serde_json::Error> {
        // Statement order carries no meaning in IAM evaluation
        let mut keyed = self
            .statement
            .iter()
            .map(|s| {
                let statement = s.canonical();
                serde_json::to_string(&statement).map(|key| (key, statement))
            })
            .collect::<Result<Vec<_>, _>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(PolicyDocument {
            version: self.version.clone(),
            statement: keyed.into_iter().map(|(_, s)| s).collect(),
            extra: self.extra.clone(),
        })
    }
}

impl Canonical for LifecyclePolicy {
    fn canonicalize(&self) -> Result<Self, serde_json::Error> {
        Ok(self.canonical())
    }
}

/// Whether two documents are semantically the same
pub fn equivalent<T: Canonical>(a: &T, b: &T) -> Result<bool, serde_json::Error> {
    Ok(a.canonical_form()? == b.canonical_form()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::builder::{AccountId, PolicyBuilder, ServiceAccess};
    use crate::policy::DEFAULT_LAMBDA_SOURCE_TEMPLATE;

    fn desired(raw: &str) -> PolicyDocument {
        PolicyBuilder::default()
            .with_service_access(ServiceAccess::lambda(DEFAULT_LAMBDA_SOURCE_TEMPLATE))
            .access_policy("myrepo", &AccountId::parse_list(raw))
    }

    #[test]
    fn test_equivalent_ignores_whitespace_and_key_order() {
        let compact = PolicyDocument::from_json(
            r#"{"Version":"2008-10-17","Statement":[{"Sid":"AllowCrossAccountPull","Effect":"Allow","Principal":{"AWS":["arn:aws:iam::111:root","arn:aws:iam::222:root"]},"Action":["ecr:BatchCheckLayerAvailability","ecr:BatchGetImage","ecr:GetDownloadUrlForLayer"]}]}"#,
        )
        .unwrap();
        let pretty = PolicyDocument::from_json(
            r#"{
  "Statement" : [ {
    "Action" : [ "ecr:GetDownloadUrlForLayer", "ecr:BatchGetImage", "ecr:BatchCheckLayerAvailability" ],
    "Principal" : { "AWS" : [ "arn:aws:iam::222:root", "arn:aws:iam::111:root" ] },
    "Effect" : "Allow",
    "Sid" : "AllowCrossAccountPull"
  } ],
  "Version" : "2008-10-17"
}"#,
        )
        .unwrap();

        assert!(equivalent(&compact, &pretty).unwrap());
        assert_eq!(
            compact.canonical_form().unwrap(),
            pretty.canonical_form().unwrap()
        );
    }

    #[test]
    fn test_single_string_equals_single_element_list() {
        let scalar = PolicyDocument::from_json(
            r#"{"Version":"2008-10-17","Statement":[{"Sid":"AllowCrossAccountPull","Effect":"Allow","Principal":{"AWS":"arn:aws:iam::111:root"},"Action":["ecr:BatchCheckLayerAvailability","ecr:BatchGetImage","ecr:GetDownloadUrlForLayer"]}]}"#,
        )
        .unwrap();
        let built = PolicyBuilder::default().access_policy("myrepo", &AccountId::parse_list("111"));
        assert!(equivalent(&scalar, &built).unwrap());
    }

    #[test]
    fn test_statement_order_is_irrelevant() {
        let policy = desired("111,222");
        let mut reversed = policy.clone();
        reversed.statement.reverse();
        assert!(equivalent(&policy, &reversed).unwrap());
    }

    #[test]
    fn test_account_order_is_irrelevant() {
        assert!(equivalent(&desired("111,222,333"), &desired("333,111,222")).unwrap());
    }

    #[test]
    fn test_removed_account_is_a_difference() {
        assert!(!equivalent(&desired("111,222"), &desired("111")).unwrap());
    }

    #[test]
    fn test_extra_statement_is_a_difference() {
        let policy = desired("111");
        let plain = PolicyBuilder::default().access_policy("myrepo", &AccountId::parse_list("111"));
        assert!(!equivalent(&policy, &plain).unwrap());
    }

    #[test]
    fn test_version_is_compared() {
        let policy = desired("111");
        let mut other = policy.clone();
        other.version = "2012-10-17".to_string();
        assert!(!equivalent(&policy, &other).unwrap());
    }

    #[test]
    fn test_lifecycle_equivalence() {
        let a = LifecyclePolicy::expire_untagged(14);
        let b = LifecyclePolicy::from_json(
            r#"{ "rules" : [ { "action" : { "type" : "expire" }, "selection" : { "countNumber" : 14, "countUnit" : "days", "countType" : "sinceImagePushed", "tagStatus" : "untagged" }, "description" : "Expire untagged images older than 14 days", "rulePriority" : 1 } ] }"#,
        )
        .unwrap();
        assert!(equivalent(&a, &b).unwrap());
        assert!(!equivalent(&a, &LifecyclePolicy::expire_untagged(30)).unwrap());
    }
}
