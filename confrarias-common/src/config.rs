//! Configuration loading
//!
//! Each key resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CONFRARIAS_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! `admin_email` has no default; startup fails without it.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_ROOT_FOLDER: &str = "CONFRARIAS_ROOT_FOLDER";
pub const ENV_BIND_ADDR: &str = "CONFRARIAS_BIND_ADDR";
pub const ENV_ADMIN_EMAIL: &str = "CONFRARIAS_ADMIN_EMAIL";
pub const ENV_PUBLIC_BASE_URL: &str = "CONFRARIAS_PUBLIC_BASE_URL";
pub const ENV_LOG_LEVEL: &str = "CONFRARIAS_LOG_LEVEL";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of `config.toml`; every key optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub admin_email: Option<String>,
    pub public_base_url: Option<String>,
    pub log_level: Option<String>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub admin_email: Option<String>,
    pub public_base_url: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub admin_email: String,
    pub public_base_url: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let toml = load_toml_config(cli.config_path.as_deref())?;
        Self::resolve_with(cli, &toml)
    }

    /// Resolve against an already loaded TOML config
    pub fn resolve_with(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let root_folder = cli
            .root_folder
            .clone()
            .or_else(|| env_value(ENV_ROOT_FOLDER).map(PathBuf::from))
            .or_else(|| toml.root_folder.clone())
            .unwrap_or_else(default_root_folder);

        let bind_addr = pick(&cli.bind_addr, ENV_BIND_ADDR, &toml.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let admin_email = pick(&cli.admin_email, ENV_ADMIN_EMAIL, &toml.admin_email)
            .ok_or_else(|| {
                Error::Config(format!(
                    "admin_email not configured. Set one of:\n\
                     1. Command line: --admin-email you@example.pt\n\
                     2. Environment: {}=you@example.pt\n\
                     3. TOML config: admin_email = \"you@example.pt\"",
                    ENV_ADMIN_EMAIL
                ))
            })?;

        let public_base_url = pick(&cli.public_base_url, ENV_PUBLIC_BASE_URL, &toml.public_base_url)
            .unwrap_or_else(|| format!("http://{}", bind_addr));

        let log_level = pick(&cli.log_level, ENV_LOG_LEVEL, &toml.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            root_folder,
            bind_addr,
            admin_email,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            log_level,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("confrarias.db")
    }

    pub fn storage_path(&self) -> PathBuf {
        self.root_folder.join("storage")
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn pick(cli: &Option<String>, env_name: &str, toml: &Option<String>) -> Option<String> {
    cli.clone()
        .or_else(|| env_value(env_name))
        .or_else(|| toml.clone())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load the TOML config file
///
/// An explicit path must exist. Without one, the platform locations are
/// tried and a missing file only produces a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {}", path.display())));
            }
            path.to_path_buf()
        }
        None => match default_config_file() {
            Some(path) => path,
            None => {
                warn!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// First existing config file among the platform locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("confrarias").join("config.toml"));
    let system_config = PathBuf::from("/etc/confrarias/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|p| p.exists())
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("confrarias"))
        .unwrap_or_else(|| PathBuf::from("./confrarias_data"))
}
