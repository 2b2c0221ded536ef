use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::ecr::RepositoryIdentity;

pub const OUTPUT_NAME: &str = "ecr-name";
pub const OUTPUT_ARN: &str = "ecr-arn";
pub const OUTPUT_URI: &str = "ecr-uri";

/// Where step outputs are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// The file named by `GITHUB_OUTPUT`
    File(PathBuf),
    /// Legacy `::set-output` workflow commands on stdout
    Stdout,
}

/// Reports results to the invoking workflow
#[derive(Debug, Clone)]
pub struct ActionOutputs {
    target: OutputTarget,
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Heredoc-style entry for a file command
fn file_command_entry(name: &str, value: &str, delimiter: &str) -> Result<String> {
    if name.contains(delimiter) {
        bail!("Output name '{}' must not contain the delimiter", name);
    }
    if value.contains(delimiter) {
        bail!("Value of output '{}' must not contain the delimiter", name);
    }
    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

impl ActionOutputs {
    pub fn new(target: OutputTarget) -> Self {
        Self { target }
    }

    /// Use `GITHUB_OUTPUT` when the runner provides it
    pub fn from_output_file(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::new(OutputTarget::File(path)),
            None => Self::new(OutputTarget::Stdout),
        }
    }

    pub fn set_output(&self, name: &str, value: &str) -> Result<()> {
        match &self.target {
            OutputTarget::File(path) => {
                let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
                let entry = file_command_entry(name, value, &delimiter)?;
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open output file {}", path.display()))?;
                file.write_all(entry.as_bytes())
                    .with_context(|| format!("Failed to write output '{}'", name))?;
            }
            OutputTarget::Stdout => {
                let mut stdout = std::io::stdout().lock();
                writeln!(
                    stdout,
                    "::set-output name={}::{}",
                    escape_property(name),
                    escape_data(value)
                )
                .with_context(|| format!("Failed to write output '{}'", name))?;
            }
        }
        Ok(())
    }

    /// Expose the repository identity as step outputs
    pub fn report_identity(&self, identity: &RepositoryIdentity) -> Result<()> {
        self.set_output(OUTPUT_NAME, &identity.name)?;
        self.set_output(OUTPUT_ARN, &identity.arn)?;
        self.set_output(OUTPUT_URI, &identity.uri)?;
        Ok(())
    }
}

/// Annotate the step as failed
///
/// Workflow commands always go to stdout, whatever the output target.
pub fn report_failure(title: &str, message: &str) {
    println!("{}", error_command(title, message));
}

/// `::error` workflow command
pub fn error_command(title: &str, message: &str) -> String {
    format!(
        "::error title={}::{}",
        escape_property(title),
        escape_data(message)
    )
}
