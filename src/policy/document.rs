use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Policy language version used for ECR repository policies
pub const POLICY_VERSION: &str = "2008-10-17";

/// A string or list of strings, as accepted by the IAM policy grammar
///
/// IAM treats these lists as sets: `"a"` and `["a"]` are the same value, and
/// so are `["a", "b"]` and `["b", "a"]`. Scalar booleans and numbers (seen in
/// condition values) are read as their string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    pub fn values(&self) -> Vec<&str> {
        match self {
            StringList::One(value) => vec![value.as_str()],
            StringList::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StringList::One(_) => false,
            StringList::Many(values) => values.is_empty(),
        }
    }

    /// Sorted, deduplicated list form
    pub fn canonical(&self) -> StringList {
        let mut values: Vec<String> = self.values().into_iter().map(String::from).collect();
        values.sort();
        values.dedup();
        StringList::Many(values)
    }
}

impl<S: Into<String>> FromIterator<S> for StringList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        StringList::Many(iter.into_iter().map(Into::into).collect())
    }
}

fn scalar_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected a string, got {}", other)),
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .map(scalar_to_string)
                .collect::<Result<Vec<_>, _>>()
                .map(StringList::Many)
                .map_err(serde::de::Error::custom),
            scalar => scalar_to_string(scalar)
                .map(StringList::One)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Statement principal: either `"*"` or a map of principal type to identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    Wildcard(String),
    Typed(BTreeMap<String, StringList>),
}

impl Principal {
    /// Principal of a single type (e.g. `AWS` or `Service`)
    pub fn of(kind: &str, identifiers: StringList) -> Self {
        Principal::Typed(BTreeMap::from([(kind.to_string(), identifiers)]))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Principal::Wildcard(_) => false,
            Principal::Typed(map) => map.values().all(StringList::is_empty),
        }
    }

    pub fn canonical(&self) -> Principal {
        match self {
            Principal::Wildcard(value) => Principal::Wildcard(value.clone()),
            Principal::Typed(map) => Principal::Typed(
                map.iter()
                    .map(|(kind, ids)| (kind.clone(), ids.canonical()))
                    .collect(),
            ),
        }
    }
}

/// Condition block: operator -> context key -> values
pub type Condition = BTreeMap<String, BTreeMap<String, StringList>>;

/// A single policy statement
///
/// Keys this model does not know about (`Resource`, `NotAction`, ...) are
/// kept in `extra` so that foreign statements survive a round trip and take
/// part in comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<StringList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Condition,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Statement {
    /// An `Allow` statement without conditions
    pub fn allow(sid: &str, principal: Principal, actions: StringList) -> Self {
        Self {
            sid: Some(sid.to_string()),
            effect: Effect::Allow,
            principal: Some(principal),
            action: Some(actions),
            condition: Condition::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_condition(mut self, operator: &str, key: &str, values: StringList) -> Self {
        self.condition
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), values);
        self
    }

    pub fn canonical(&self) -> Statement {
        Statement {
            sid: self.sid.clone(),
            effect: self.effect,
            principal: self.principal.as_ref().map(Principal::canonical),
            action: self.action.as_ref().map(StringList::canonical),
            condition: self
                .condition
                .iter()
                .map(|(operator, entries)| {
                    (
                        operator.clone(),
                        entries
                            .iter()
                            .map(|(key, values)| (key.clone(), values.canonical()))
                            .collect(),
                    )
                })
                .collect(),
            extra: self.extra.clone(),
        }
    }
}

fn one_or_many_statements<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Statement>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Statement>),
        One(Box<Statement>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(statements) => statements,
        OneOrMany::One(statement) => vec![*statement],
    })
}

/// ECR repository access policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(default, deserialize_with = "one_or_many_statements")]
    pub statement: Vec<Statement>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
            extra: BTreeMap::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Whether any statement grants something to a principal
    pub fn has_principals(&self) -> bool {
        self.statement
            .iter()
            .any(|s| s.principal.as_ref().is_some_and(|p| !p.is_empty()))
    }

    /// Identifiers of the given principal type across all statements
    pub fn principals(&self, kind: &str) -> Vec<&str> {
        self.statement
            .iter()
            .filter_map(|s| match &s.principal {
                Some(Principal::Typed(map)) => map.get(kind),
                _ => None,
            })
            .flat_map(StringList::values)
            .collect()
    }
}

#[cfg(test)]
impl PolicyDocument {
    pub fn statement(&self, sid: &str) -> Option<&Statement> {
        self.statement.iter().find(|s| s.sid.as_deref() == Some(sid))
    }
}
