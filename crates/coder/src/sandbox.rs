//! Path containment for every filesystem tool.
//!
//! A [`SandboxConfig`] is built once from the candidate directories given at
//! startup and is immutable afterwards; tools hold it behind an `Arc`.
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, Default)]
pub struct SandboxConfig {
    /// Canonical (symlink-free) roots
    allowed_roots: Vec<PathBuf>,
    /// The same roots as the caller spelled them, absolute and normalized.
    /// Requested paths are compared lexically before any symlink is resolved,
    /// so a root reached through a symlinked ancestor must also match here.
    lexical_roots: Vec<PathBuf>,
}

impl SandboxConfig {
    /// Build the allowed-root set, dropping candidates that are missing or not directories
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = SandboxConfig::default();

        for candidate in candidates {
            let candidate = candidate.as_ref();
            let lexical = match absolutize(&expand_home(candidate)) {
                Ok(path) => normalize(&path),
                Err(e) => {
                    warn!(directory = candidate, error = %e, "Could not resolve allowed directory");
                    continue;
                }
            };

            if !lexical.exists() {
                warn!(directory = candidate, resolved = %lexical.display(), "Allowed directory does not exist");
                continue;
            }
            if !lexical.is_dir() {
                warn!(directory = candidate, resolved = %lexical.display(), "Allowed path is not a directory");
                continue;
            }

            match fs::canonicalize(&lexical) {
                Ok(canonical) => {
                    config.allowed_roots.push(canonical);
                    config.lexical_roots.push(lexical);
                }
                Err(e) => {
                    warn!(directory = candidate, error = %e, "Could not canonicalize allowed directory");
                }
            }
        }

        if config.allowed_roots.is_empty() {
            warn!("No allowed directories configured, all filesystem access will be denied");
        } else {
            debug!(roots = ?config.allowed_roots, "Sandbox configured");
        }
        config
    }

    pub fn allowed_roots(&self) -> &[PathBuf] {
        &self.allowed_roots
    }

    /// Resolve a requested path to its canonical form, or refuse it.
    ///
    /// Existing paths are returned with symlinks resolved. A path that does
    /// not exist yet is accepted when its parent directory does and lives
    /// inside the sandbox.
    pub fn validate(&self, requested: &str) -> AgentResult<PathBuf> {
        let absolute = absolutize(&expand_home(requested))?;
        let normalized = normalize(&absolute);

        if !self.is_lexically_allowed(&normalized) {
            return Err(AgentError::AccessDenied(format!(
                "path outside allowed directories: {} not in {}",
                normalized.display(),
                self.display_roots()
            )));
        }

        // `missing/../file` cannot be resolved as spelled but may still exist once normalized
        let resolved = fs::canonicalize(&absolute).or_else(|_| fs::canonicalize(&normalized));
        match resolved {
            Ok(real) => {
                if !self.is_allowed(&real) {
                    return Err(AgentError::AccessDenied(format!(
                        "symlink target outside allowed directories: {}",
                        real.display()
                    )));
                }
                Ok(real)
            }
            Err(_) if fs::symlink_metadata(&normalized).is_ok() => {
                Err(AgentError::AccessDenied(format!(
                    "cannot resolve symlink target: {}",
                    normalized.display()
                )))
            }
            Err(_) => self.validate_new_path(&normalized),
        }
    }

    /// Like [`SandboxConfig::validate`], but missing ancestors are allowed.
    ///
    /// The deepest existing ancestor must resolve inside the sandbox; the
    /// missing tail is appended to its real path.
    pub fn validate_for_create(&self, requested: &str) -> AgentResult<PathBuf> {
        let normalized = normalize(&absolutize(&expand_home(requested))?);
        if !self.is_lexically_allowed(&normalized) {
            return Err(AgentError::AccessDenied(format!(
                "path outside allowed directories: {} not in {}",
                normalized.display(),
                self.display_roots()
            )));
        }

        let mut existing = normalized.as_path();
        let mut missing = Vec::new();
        while fs::symlink_metadata(existing).is_err() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = parent;
                }
                _ => break,
            }
        }

        let real = fs::canonicalize(existing).map_err(|_| {
            AgentError::AccessDenied(format!("cannot resolve path: {}", existing.display()))
        })?;
        if !self.is_allowed(&real) {
            return Err(AgentError::AccessDenied(format!(
                "path resolves outside allowed directories: {}",
                real.display()
            )));
        }
        Ok(missing.into_iter().rev().fold(real, |path, name| path.join(name)))
    }

    fn validate_new_path(&self, normalized: &Path) -> AgentResult<PathBuf> {
        let (parent, file_name) = match (normalized.parent(), normalized.file_name()) {
            (Some(parent), Some(file_name)) => (parent, file_name),
            _ => {
                return Err(AgentError::NotFound(format!(
                    "path does not exist: {}",
                    normalized.display()
                )))
            }
        };

        let real_parent = fs::canonicalize(parent).map_err(|_| {
            AgentError::NotFound(format!(
                "Parent directory does not exist: {}",
                parent.display()
            ))
        })?;

        if !self.is_allowed(&real_parent) {
            return Err(AgentError::AccessDenied(format!(
                "parent directory outside allowed directories: {}",
                real_parent.display()
            )));
        }
        Ok(real_parent.join(file_name))
    }

    fn is_allowed(&self, real: &Path) -> bool {
        self.allowed_roots.iter().any(|root| real.starts_with(root))
    }

    fn is_lexically_allowed(&self, normalized: &Path) -> bool {
        self.is_allowed(normalized)
            || self
                .lexical_roots
                .iter()
                .any(|root| normalized.starts_with(root))
    }

    fn display_roots(&self) -> String {
        self.allowed_roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Expand a leading `~` to the user's home directory
fn expand_home(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

fn absolutize(path: &str) -> AgentResult<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Collapse `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
