use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_UNTAGGED_EXPIRY_DAYS: u32 = 14;

/// ECR lifecycle policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePolicy {
    #[serde(default)]
    pub rules: Vec<LifecycleRule>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub rule_priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub selection: Value,
    pub action: Value,
}

impl LifecyclePolicy {
    /// Single rule expiring untagged images older than `days`
    pub fn expire_untagged(days: u32) -> Self {
        Self {
            rules: vec![LifecycleRule {
                rule_priority: 1,
                description: Some(format!("Expire untagged images older than {} days", days)),
                selection: serde_json::json!({
                    "tagStatus": "untagged",
                    "countType": "sinceImagePushed",
                    "countUnit": "days",
                    "countNumber": days,
                }),
                action: serde_json::json!({ "type": "expire" }),
            }],
            extra: BTreeMap::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Rules ordered by priority; ECR evaluates them in that order
    pub fn canonical(&self) -> LifecyclePolicy {
        let mut rules = self.rules.clone();
        rules.sort_by_key(|r| r.rule_priority);
        LifecyclePolicy {
            rules,
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expire_untagged_shape() {
        let policy = LifecyclePolicy::expire_untagged(14);
        let json: Value = serde_json::from_str(&policy.to_json().unwrap()).unwrap();

        let rule = &json["rules"][0];
        assert_eq!(rule["rulePriority"], 1);
        assert_eq!(rule["selection"]["tagStatus"], "untagged");
        assert_eq!(rule["selection"]["countType"], "sinceImagePushed");
        assert_eq!(rule["selection"]["countUnit"], "days");
        assert_eq!(rule["selection"]["countNumber"], 14);
        assert_eq!(rule["action"]["type"], "expire");
    }

    #[test]
    fn test_parse_stored_lifecycle_policy() {
        let text = r#"{"rules":[{"rulePriority":1,"description":"Expire untagged images older than 14 days","selection":{"tagStatus":"untagged","countType":"sinceImagePushed","countUnit":"days","countNumber":14},"action":{"type":"expire"}}]}"#;
        let policy = LifecyclePolicy::from_json(text).unwrap();
        assert_eq!(policy, LifecyclePolicy::expire_untagged(14));
    }
}
