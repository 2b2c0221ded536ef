use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// The part of the triggering event payload this tool reads
#[derive(Debug, Deserialize)]
struct EventPayload {
    repository: Option<EventRepository>,
}

#[derive(Debug, Deserialize)]
struct EventRepository {
    name: Option<String>,
}

/// Read `repository.name` from the event payload JSON at `path`
pub fn repository_name_from_event(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload {}", path.display()))?;

    let payload: EventPayload = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse event payload {}", path.display()))?;

    payload
        .repository
        .and_then(|r| r.name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .with_context(|| {
            format!(
                "Event payload {} has no repository.name to derive the ECR repository name from",
                path.display()
            )
        })
}

/// Resolve the repository name: an explicit name wins over the event payload
pub fn resolve_repository_name(
    explicit: Option<&str>,
    event_path: Option<&Path>,
) -> Result<String> {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }

    let path = event_path.context(
        "No ECR repository name given and no event payload available (GITHUB_EVENT_PATH is not set)",
    )?;
    repository_name_from_event(path)
}
