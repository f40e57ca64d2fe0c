//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from (highest priority first): command-line
//! flag, environment variable, TOML file, compiled default. Command-line
//! and environment layers are handled by each binary's clap `Args`; this
//! module owns the TOML layer and the compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CDSS_ROOT_FOLDER";

/// Environment variable naming an explicit TOML file
pub const CONFIG_ENV: &str = "CDSS_CONFIG";

pub const GATEWAY_PORT: u16 = 5800;
pub const AUTHENTICATION_PORT: u16 = 5801;
pub const DATA_PROCESSING_PORT: u16 = 5802;
pub const EXPLAINABLE_AI_PORT: u16 = 5803;
pub const AUDIT_PORT: u16 = 5804;

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; a file containing only `root_folder` is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding each service's SQLite database
    pub root_folder: Option<PathBuf>,

    pub endpoints: EndpointsConfig,
    pub upstream: UpstreamConfig,
    pub limits: LimitsConfig,
    pub auth: AuthConfig,
    pub pipeline: PipelineConfig,
    pub models: ModelsConfig,
    pub audit: AuditConfig,
}

/// Base URLs of the services, without route prefix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub gateway: String,
    pub authentication: String,
    pub data_processing: String,
    pub explainable_ai: String,
    pub audit: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            gateway: local_url(GATEWAY_PORT),
            authentication: local_url(AUTHENTICATION_PORT),
            data_processing: local_url(DATA_PROCESSING_PORT),
            explainable_ai: local_url(EXPLAINABLE_AI_PORT),
            audit: local_url(AUDIT_PORT),
        }
    }
}

fn local_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Remote call limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Default request body cap for services accepting raw clinical data
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// Inbound request limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request body accepted by `/gateway` and `/data_processing`
    pub body_limit_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

/// Token authority settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret; generated and stored in the database when absent
    pub token_secret: Option<String>,
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_minutes: 60,
        }
    }
}

/// Preprocessing pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reject strategy tags no normalizer claims instead of passing them through
    pub strict: bool,
}

/// External model collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    pub hub_url: Option<String>,
    pub generator_url: Option<String>,
}

/// Audit delivery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Await audit delivery before responding
    pub inline: bool,
}

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/cdss (or /var/lib/cdss for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("cdss"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cdss"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("cdss"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cdss"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("cdss"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cdss"))
    } else {
        PathBuf::from("./cdss_data")
    }
}

/// Candidate default config file locations, in lookup order
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("cdss").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/cdss/config.toml"));
    }
    paths
}

/// Load the TOML configuration
///
/// An explicitly named file must exist and parse. Without one, the first
/// existing default location is used; if none exists the compiled defaults
/// are returned with a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return read_toml_file(path);
    }

    for candidate in default_config_paths() {
        if candidate.exists() {
            return read_toml_file(&candidate);
        }
    }

    warn!("No config file found, using compiled defaults");
    Ok(TomlConfig::default())
}

fn read_toml_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolves the root folder for one service
///
/// Priority: command-line argument, `CDSS_ROOT_FOLDER`, TOML `root_folder`,
/// compiled default.
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            info!("{}: root folder from command line: {}", self.module_name, path.display());
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                info!("{}: root folder from {}: {}", self.module_name, ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            info!("{}: root folder from config file: {}", self.module_name, path.display());
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        let path = CompiledDefaults::for_current_platform().root_folder;
        info!("{}: root folder default: {}", self.module_name, path.display());
        path
    }
}

/// Prepares a resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    /// Path of a service database inside the root folder
    pub fn database_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn database_exists(&self, file_name: &str) -> bool {
        self.database_path(file_name).exists()
    }
}
