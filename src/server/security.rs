//! Input checks for names and paths that come from clients.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

static PROJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("project name regex"));

pub fn is_valid_project_name(name: &str) -> bool {
    PROJECT_NAME.is_match(name)
}

/// Resolves a client-supplied relative path to an existing file under `root`.
///
/// Returns `None` for anything that is not a plain relative path, that escapes
/// `root` once symlinks are resolved, or that does not name a regular file.
/// Callers must not distinguish between these cases in their response.
pub fn resolve_download(root: &Path, requested: &str) -> Option<PathBuf> {
    if requested.is_empty() || requested.contains('\\') || requested.contains('\0') {
        return None;
    }
    let relative = Path::new(requested);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        warn!("Rejected download path {:?}", requested);
        return None;
    }

    let root = root.canonicalize().ok()?;
    let resolved = root.join(relative).canonicalize().ok()?;
    if !resolved.starts_with(&root) {
        warn!("Rejected download path {:?} outside output root", requested);
        return None;
    }
    resolved.is_file().then_some(resolved)
}
