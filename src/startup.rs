//! Startup sequence
//!
//! The store is in-memory only, so a restart begins empty. A bootstrap file
//! (YAML or JSON, a list of change requests) repopulates it by replaying each
//! request in order through the configuration service.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::ChangeRequest;
use crate::errors::{Error, Result};
use crate::services::{ConfigurationService, PublishOutcome};

/// Counts from one bootstrap replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Requests committed and published
    pub applied: usize,
    /// Requests rejected without mutation
    pub rejected: usize,
    /// Requests committed whose snapshot did not go live
    pub not_live: usize,
}

/// Read change requests from a YAML or JSON file
pub fn load_bootstrap(path: impl AsRef<Path>) -> Result<Vec<ChangeRequest>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read bootstrap file {}", path.display()), e))?;

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let requests: Vec<ChangeRequest> = serde_yaml::from_str(&contents)?;
    info!(path = %path.display(), requests = requests.len(), "Loaded bootstrap file");
    Ok(requests)
}

/// Apply `requests` in order. A failing request is logged and counted; the
/// replay carries on with the next one.
pub fn replay(
    service: &ConfigurationService,
    requests: impl IntoIterator<Item = ChangeRequest>,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for (index, request) in requests.into_iter().enumerate() {
        let operation = request.operation();
        match service.apply(request) {
            Ok(applied) => match applied.publish {
                PublishOutcome::Published { .. } => summary.applied += 1,
                PublishOutcome::Failed(e) => {
                    warn!(index, operation, error = %e, "Bootstrap request saved but not live");
                    summary.not_live += 1;
                }
            },
            Err(e) => {
                warn!(index, operation, error = %e, "Bootstrap request rejected");
                summary.rejected += 1;
            }
        }
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        not_live = summary.not_live,
        "Bootstrap replay finished"
    );
    summary
}

/// Load and replay a bootstrap file
pub fn bootstrap(service: &ConfigurationService, path: impl AsRef<Path>) -> Result<ReplaySummary> {
    let requests = load_bootstrap(path)?;
    Ok(replay(service, requests))
}
