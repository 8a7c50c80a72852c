//! Configuration Vault – reads/writes `~/.asrs-twin/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use asrs_middleware::PlcEndpoint;
use asrs_runtime::TwinConfig;

/// Persisted configuration stored in `~/.asrs-twin/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The PLC the system loop talks to.
    #[serde(default)]
    pub plc: PlcEndpoint,

    /// Scene description loaded at startup.  Without one the built-in demo
    /// rack is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<PathBuf>,

    #[serde(default)]
    pub twin: TwinConfig,
}

/// Return the path to `~/.asrs-twin/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".asrs-twin").join("config.toml")
}

/// Load the config at `path` and apply the `ASRS_*` overrides.  Returns
/// `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let Some(mut cfg) = read_from(path)? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// The file's contents exactly, without environment overrides.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    parse(&raw).map(Some)
}

pub(crate) fn parse(raw: &str) -> Result<Config, String> {
    toml::from_str(raw).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `ASRS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ASRS_PLC_HOST` | `plc.host` |
/// | `ASRS_PLC_RACK` | `plc.rack` |
/// | `ASRS_PLC_SLOT` | `plc.slot` |
/// | `ASRS_SCENE` | `scene` |
/// | `ASRS_INTERVAL_MS` | `twin.poll_interval_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ASRS_PLC_HOST") {
        cfg.plc.host = v;
    }
    if let Ok(v) = std::env::var("ASRS_PLC_RACK")
        && let Ok(rack) = v.parse::<u16>()
    {
        cfg.plc.rack = rack;
    }
    if let Ok(v) = std::env::var("ASRS_PLC_SLOT")
        && let Ok(slot) = v.parse::<u16>()
    {
        cfg.plc.slot = slot;
    }
    if let Ok(v) = std::env::var("ASRS_SCENE") {
        cfg.scene = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("ASRS_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.twin.poll_interval_ms = ms;
    }
}

/// Save the config to `path`, creating its directory if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
