use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use color_eyre::{eyre::WrapErr, Result};
use dirs::config_dir;
use hawk_service::ServiceConfig;

/// Read `<config dir>/hawk/config.toml`, falling back to a local Couchbase
/// store at `warn` level when the file is absent.
pub fn load() -> Result<ServiceConfig> {
    let path = default_path()?;
    load_from_path(path)
}

/// Parse a hawk config file. An absent or blank file yields
/// [`ServiceConfig::default`]; an unknown store `kind` is an error.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ServiceConfig::default()),
        Err(err) => return Err(err).wrap_err_with(|| format!("reading {}", path.display())),
    };
    if contents.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }
    toml::from_str(&contents).wrap_err_with(|| format!("parsing {}", path.display()))
}

/// Where `hawk config init` writes and `hawk` reads when `--config` is not given.
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("hawk").join("config.toml"))
}

/// Write the config to `path` unless a file is already there, creating
/// parent directories as needed. Existing files are left untouched.
pub fn write_if_missing(config: &ServiceConfig, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
