use anyhow::{bail, Context, Result};
use std::collections::HashMap;

/// Inputs of a GitHub Action step
///
/// The runner exposes each `with:` input as `INPUT_<NAME>`, where the name is
/// upper-cased and spaces become underscores. Hyphens are kept, so input
/// `ecr-name` arrives as `INPUT_ECR-NAME`.
#[derive(Debug, Clone, Default)]
pub struct ActionInputs {
    vars: HashMap<String, String>,
}

impl ActionInputs {
    /// Capture the inputs of the current process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(k, _)| k.starts_with("INPUT_"))
                .collect(),
        }
    }

    fn variable_name(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }

    /// Trimmed value of an input, `None` when unset or blank
    pub fn get(&self, name: &str) -> Option<String> {
        self.vars
            .get(&Self::variable_name(name))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Boolean input following the YAML 1.2 core schema
    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name).as_deref() {
            None => Ok(None),
            Some("true" | "True" | "TRUE") => Ok(Some(true)),
            Some("false" | "False" | "FALSE") => Ok(Some(false)),
            Some(other) => bail!(
                "Input '{}' does not meet YAML 1.2 \"Core Schema\" specification (got '{}'). \
                 Support boolean input list: `true | True | TRUE | false | False | FALSE`",
                name,
                other
            ),
        }
    }

    /// Unsigned integer input
    pub fn get_u32(&self, name: &str) -> Result<Option<u32>> {
        self.get(name)
            .map(|value| {
                value.parse::<u32>().with_context(|| {
                    format!("Input '{}' is not a positive integer: '{}'", name, value)
                })
            })
            .transpose()
    }
}
