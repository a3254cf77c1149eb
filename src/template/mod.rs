//! Template lookup utilities for the report generator.

use std::env;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::builder::DeckBuilder;
use crate::error::{ReportError, Result};

/// Environment variable that overrides every other template location.
pub const TEMPLATE_ENV_VAR: &str = "CASE_REVIEW_TEMPLATE";

/// File name searched for under the `assets` directories.
pub const TEMPLATE_FILE_NAME: &str = "template.pptx";

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn push_unique(candidates: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !candidates.iter().any(|existing| existing == &candidate) {
        candidates.push(candidate);
    }
}

/// Lists the template locations checked, in priority order.
pub fn template_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(TEMPLATE_ENV_VAR) {
        push_unique(&mut candidates, path);
    }

    if let Some(path) = configured {
        push_unique(&mut candidates, path.to_path_buf());
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push_unique(&mut candidates, bin_dir.join("assets").join(TEMPLATE_FILE_NAME));
        }
    }

    push_unique(
        &mut candidates,
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("assets")
            .join(TEMPLATE_FILE_NAME),
    );

    candidates
}

/// Resolves the slide template, returning the first candidate that exists.
///
/// The error lists every location that was checked.
pub fn resolve_template_path(configured: Option<&Path>) -> Result<PathBuf> {
    let mut attempts = Vec::new();

    for candidate in template_candidates(configured) {
        if candidate.is_file() {
            debug!("Using slide template {}", candidate.display());
            return Ok(candidate);
        }
        if configured == Some(candidate.as_path()) {
            warn!(
                "Configured slide template {} not found; trying fallbacks",
                candidate.display()
            );
        }
        attempts.push(candidate.display().to_string());
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };
    Err(ReportError::TemplateNotFound(summary))
}

/// Reads the template at `path` into a fresh [`DeckBuilder`].
///
/// The file is only read; every invocation starts from the pristine template.
pub async fn load_template(path: &Path) -> Result<DeckBuilder> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(DeckBuilder::from_bytes(&bytes)?)
}
