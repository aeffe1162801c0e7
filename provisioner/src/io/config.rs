//! Provisioner configuration, loaded from a TOML file.
//!
//! This file is intended to be edited by humans and must remain stable and
//! automatable. Missing fields default to sensible values; a missing file
//! yields the full default configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Provisioner configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// User added to the `docker` group when no argument and no `SUDO_USER`
    /// context is available.
    pub default_user: String,

    /// Directory where standalone binaries are installed.
    pub install_dir: PathBuf,

    /// Wall-clock budget for a single external command.
    pub command_timeout_secs: u64,

    /// Wall-clock budget for a single artifact download.
    pub download_timeout_secs: u64,

    /// Truncate captured command output beyond this many bytes.
    pub output_limit_bytes: usize,

    pub compose: ComposeConfig,
    pub kubectl: KubectlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComposeConfig {
    /// Package that provides the `docker compose` plugin subcommand.
    pub plugin_package: String,

    /// Version installed when the release lookup fails. Substitution is
    /// logged at warn level; a stale pin should be visible, never silent.
    pub fallback_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubectlConfig {
    /// Version installed when the stable-release lookup fails. Logged at
    /// warn level on substitution, same policy as compose.
    pub fallback_version: String,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            plugin_package: "docker-compose-plugin".to_string(),
            fallback_version: "v2.29.7".to_string(),
        }
    }
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            fallback_version: "v1.31.1".to_string(),
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            default_user: "ec2-user".to_string(),
            install_dir: PathBuf::from("/usr/local/bin"),
            command_timeout_secs: 15 * 60,
            download_timeout_secs: 10 * 60,
            output_limit_bytes: 256 * 1024,
            compose: ComposeConfig::default(),
            kubectl: KubectlConfig::default(),
        }
    }
}

impl ProvisionerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_user.trim().is_empty() {
            return Err(anyhow!("default_user must be non-empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.download_timeout_secs == 0 {
            return Err(anyhow!("download_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.compose.plugin_package.trim().is_empty() {
            return Err(anyhow!("compose.plugin_package must be non-empty"));
        }
        if self.compose.fallback_version.trim().is_empty() {
            return Err(anyhow!("compose.fallback_version must be non-empty"));
        }
        if self.kubectl.fallback_version.trim().is_empty() {
            return Err(anyhow!("kubectl.fallback_version must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ProvisionerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ProvisionerConfig> {
    if !path.exists() {
        let cfg = ProvisionerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ProvisionerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
