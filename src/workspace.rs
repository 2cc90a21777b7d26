//! Workspace resolution — deriving the slug that tags a memory.
//!
//! Resolution walks a priority chain: explicit caller argument, fresh cache
//! entry, nearest ancestor package manifest, current directory basename, then
//! the configured default. Results are cached with a TTL so repeated store
//! calls don't re-read manifests.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Workspace names that can never be used as slugs.
pub const RESERVED_WORKSPACES: [&str; 8] = [
    "system",
    "metadata",
    "admin",
    "internal",
    "default",
    "null",
    "undefined",
    "root",
];

const MAX_WORKSPACE_LEN: usize = 100;
const MAX_MANIFEST_WALK: usize = 5;

/// Where a resolved workspace came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceSource {
    Explicit,
    Cache,
    Manifest,
    Directory,
    Default,
}

/// Explicit caller intent for the workspace argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceArg {
    /// Caller said nothing; run the detection chain.
    Unspecified,
    /// Caller explicitly asked for no workspace.
    None,
    /// Caller supplied a name; it must validate.
    Named(String),
}

#[derive(Debug, Clone)]
pub struct WorkspaceResolution {
    /// Lowercased slug, or `None` when nothing resolved.
    pub workspace: Option<String>,
    pub source: WorkspaceSource,
}

struct CacheEntry {
    workspace: Option<String>,
    source: WorkspaceSource,
    resolved_at: Instant,
}

/// Resolver with TTL caching. One per process.
pub struct WorkspaceResolver {
    auto_detect: bool,
    default_workspace: Option<String>,
    cache_ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl WorkspaceResolver {
    pub fn new(auto_detect: bool, default_workspace: Option<String>, cache_ttl: Duration) -> Self {
        Self {
            auto_detect,
            default_workspace,
            cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Resolve a workspace for the current process directory.
    pub fn resolve(&self, arg: WorkspaceArg) -> Result<WorkspaceResolution> {
        match arg {
            WorkspaceArg::Named(name) => {
                validate_workspace(&name).map_err(|e| anyhow::anyhow!(e))?;
                return Ok(WorkspaceResolution {
                    workspace: Some(name.to_lowercase()),
                    source: WorkspaceSource::Explicit,
                });
            }
            WorkspaceArg::None => {
                return Ok(WorkspaceResolution {
                    workspace: None,
                    source: WorkspaceSource::Explicit,
                });
            }
            WorkspaceArg::Unspecified => {}
        }

        if let Some(cached) = self.fresh_cache_entry() {
            return Ok(cached);
        }

        let resolution = self.detect();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = Some(CacheEntry {
            workspace: resolution.workspace.clone(),
            source: resolution.source,
            resolved_at: Instant::now(),
        });
        Ok(resolution)
    }

    /// Drop the cached resolution.
    pub fn clear(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    fn fresh_cache_entry(&self) -> Option<WorkspaceResolution> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let entry = cache.as_ref()?;
        if entry.resolved_at.elapsed() > self.cache_ttl {
            return None;
        }
        Some(WorkspaceResolution {
            workspace: entry.workspace.clone(),
            source: WorkspaceSource::Cache,
        })
    }

    fn detect(&self) -> WorkspaceResolution {
        if self.auto_detect {
            if let Ok(cwd) = std::env::current_dir() {
                if let Some(name) = manifest_workspace(&cwd) {
                    return WorkspaceResolution {
                        workspace: Some(name.to_lowercase()),
                        source: WorkspaceSource::Manifest,
                    };
                }
                if let Some(name) = directory_workspace(&cwd) {
                    return WorkspaceResolution {
                        workspace: Some(name.to_lowercase()),
                        source: WorkspaceSource::Directory,
                    };
                }
            }
        }

        WorkspaceResolution {
            workspace: self
                .default_workspace
                .as_ref()
                .filter(|name| validate_workspace(name).is_ok())
                .map(|name| name.to_lowercase()),
            source: WorkspaceSource::Default,
        }
    }
}

/// Check a candidate slug: 1-100 chars of `[A-Za-z0-9_-]`, not reserved.
pub fn validate_workspace(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > MAX_WORKSPACE_LEN {
        return Err(format!(
            "workspace must be 1-{MAX_WORKSPACE_LEN} characters, got {}",
            name.len()
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "workspace '{name}' contains invalid characters (allowed: letters, digits, '_', '-')"
        ));
    }
    let lowered = name.to_lowercase();
    if RESERVED_WORKSPACES.contains(&lowered.as_str()) {
        return Err(format!("workspace '{name}' is a reserved name"));
    }
    Ok(())
}

/// Normalize a package-manifest name into a workspace candidate: strip a
/// `@scope/` prefix and a leading `mcp-`, map invalid characters to `-`,
/// collapse runs, trim the ends.
pub fn normalize_manifest_name(raw: &str) -> String {
    let name = raw.split_once('/').map_or(raw, |(scope, rest)| {
        if scope.starts_with('@') {
            rest
        } else {
            raw
        }
    });
    let name = name.strip_prefix("mcp-").unwrap_or(name);

    let mut normalized = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            normalized.push(c);
            last_dash = c == '-';
        } else if !last_dash {
            normalized.push('-');
            last_dash = true;
        }
    }
    normalized.trim_matches('-').to_string()
}

/// Search `start` and up to five ancestors for a package manifest that yields
/// a valid workspace name.
fn manifest_workspace(start: &Path) -> Option<String> {
    let mut dir: Option<&Path> = Some(start);
    for _ in 0..=MAX_MANIFEST_WALK {
        let current = dir?;
        if let Some(name) = read_manifest_name(current) {
            let normalized = normalize_manifest_name(&name);
            if validate_workspace(&normalized).is_ok() {
                return Some(normalized);
            }
        }
        dir = current.parent();
    }
    None
}

/// Read a declared package name from `package.json` or `Cargo.toml` in `dir`.
fn read_manifest_name(dir: &Path) -> Option<String> {
    let package_json = dir.join("package.json");
    if let Ok(contents) = std::fs::read_to_string(&package_json) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&contents) {
            if let Some(name) = json.get("name").and_then(|n| n.as_str()) {
                return Some(name.to_string());
            }
        }
    }

    let cargo_toml = dir.join("Cargo.toml");
    if let Ok(contents) = std::fs::read_to_string(&cargo_toml) {
        if let Ok(parsed) = contents.parse::<toml::Value>() {
            if let Some(name) = parsed
                .get("package")
                .and_then(|p| p.get("name"))
                .and_then(|n| n.as_str())
            {
                return Some(name.to_string());
            }
        }
    }

    None
}

fn directory_workspace(cwd: &PathBuf) -> Option<String> {
    let basename = cwd.file_name()?.to_str()?;
    validate_workspace(basename).ok().map(|_| basename.to_string())
}
