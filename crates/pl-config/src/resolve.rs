//! Config file resolution.
//!
//! Precedence: explicit CLI path → `PL_CONFIG` environment variable →
//! `$XDG_CONFIG_HOME/partload/loader.toml`.

use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "PL_CONFIG";

const DEFAULT_FILE_NAME: &str = "loader.toml";

/// Where the resolved path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    Env,
    Default,
}

/// Resolve the config file path.
///
/// Returns `None` only when no CLI path or env var is given and the platform
/// has no config directory.
pub fn resolve_config_path(cli: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    resolve_with_env(cli, std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn resolve_with_env(
    cli: Option<&Path>,
    env: Option<PathBuf>,
) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = cli {
        return Some((path.to_path_buf(), ConfigSource::Cli));
    }
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return Some((path, ConfigSource::Env));
    }
    dirs::config_dir().map(|dir| {
        (
            dir.join("partload").join(DEFAULT_FILE_NAME),
            ConfigSource::Default,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_wins_over_env() {
        let (path, source) = resolve_with_env(
            Some(Path::new("/cli.toml")),
            Some(PathBuf::from("/env.toml")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/cli.toml"));
        assert_eq!(source, ConfigSource::Cli);
    }

    #[test]
    fn env_used_without_cli() {
        let (path, source) = resolve_with_env(None, Some(PathBuf::from("/env.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/env.toml"));
        assert_eq!(source, ConfigSource::Env);
    }

    #[test]
    fn empty_env_falls_through() {
        if let Some((path, source)) = resolve_with_env(None, Some(PathBuf::new())) {
            assert_eq!(source, ConfigSource::Default);
            assert!(path.ends_with("partload/loader.toml"));
        }
    }
}
