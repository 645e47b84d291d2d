use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://campaign_metrics.sqlite";

const SQLITE_URL_PREFIXES: &[&str] = &["sqlite://", "sqlite:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub database_path: PathBuf,
}

/// Reads `DATABASE_URL`, honoring a `.env` file in the working directory.
#[must_use]
pub fn database_url_from_env() -> Option<String> {
    dotenvy::var(DATABASE_URL_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves the store location: explicit override, then environment, then
/// [`DEFAULT_DATABASE_URL`].
pub fn resolve_database_config(
    url_override: Option<&str>,
    env_url: Option<&str>,
    home_dir: Option<&Path>,
    cwd: &Path,
) -> Result<DatabaseConfig> {
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let database_url = url_override
        .or(env_url)
        .unwrap_or(DEFAULT_DATABASE_URL)
        .trim()
        .to_string();
    let raw_path = strip_sqlite_scheme(&database_url)?;
    if raw_path.is_empty() {
        bail!("database url does not name a file: {database_url}");
    }

    let cwd = normalize_lexical(cwd);
    let database_path = resolve_user_path(Path::new(raw_path), home_dir, &cwd)?;

    Ok(DatabaseConfig {
        database_url,
        database_path,
    })
}

fn strip_sqlite_scheme(database_url: &str) -> Result<&str> {
    for prefix in SQLITE_URL_PREFIXES {
        if let Some(rest) = database_url.strip_prefix(prefix) {
            return Ok(rest);
        }
    }

    if let Some((scheme, _)) = database_url.split_once("://") {
        bail!(
            "unsupported database scheme `{scheme}` (only sqlite:// urls and plain paths are supported)"
        );
    }

    Ok(database_url)
}

fn resolve_user_path(path: &Path, home_dir: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: Option<&Path>) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let Some(home_dir) = home_dir else {
                bail!("HOME is not set; cannot expand {}", path.display());
            };
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
