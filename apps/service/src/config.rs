use std::time::Duration;
use std::ffi::OsString;
use std::{env, fmt, fs, io, path};

use netcheck::{PollSettings, TcpProber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEVICES_ENV: &str = "NETCHECK_DEVICES";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read settings from {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write settings to {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse settings: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no configuration directory available")]
    ConfigPathUnavailable,
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll: Poll,
    pub probe: Probe,
    pub paths: Paths,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Poll {
    pub interval_ms: u64,
    pub stop_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub port: u16,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Device configuration (JSON)
    pub devices: Option<path::PathBuf>,
    pub log_file: Option<path::PathBuf>,
}

impl Default for Poll {
    fn default() -> Self {
        let defaults = PollSettings::default();
        Self {
            interval_ms: defaults.interval.as_millis() as u64,
            stop_grace_ms: defaults.stop_grace.as_millis() as u64,
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            port: netcheck::DEFAULT_PROBE_PORT,
            timeout_ms: netcheck::DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default settings path ($XDG_CONFIG_HOME/netcheck/settings.toml or the
/// platform config directory)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(config_dir) = dirs::config_dir() {
        config_dir
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("netcheck/settings.toml"))
}

/// Application data directory shared with the device configuration
/// (~/Documents/network-checker)
fn data_dir() -> Result<path::PathBuf, Error> {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .map(|dir| dir.join("network-checker"))
        .ok_or(Error::ConfigPathUnavailable)
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let show_path = |path: &Option<path::PathBuf>| {
            path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(default)".into())
        };

        writeln!(f, "Current Settings:")?;
        write_title_1(f, "Polling")?;
        write_1(f, "Interval (ms)", &self.poll.interval_ms)?;
        write_1(f, "Stop Grace (ms)", &self.poll.stop_grace_ms)?;
        write_title_1(f, "Probe")?;
        write_1(f, "TCP Port", &self.probe.port)?;
        write_1(f, "Timeout (ms)", &self.probe.timeout_ms)?;
        write_title_1(f, "Paths")?;
        write_1(f, "Devices", &show_path(&self.paths.devices))?;
        write_1(f, "Log File", &show_path(&self.paths.log_file))?;

        Ok(())
    }
}

impl Settings {
    /// Generate Settings structure from file
    ///
    /// Creates a default settings file in ~/.config/netcheck/settings.toml
    ///  or the specified path if one does not exist
    ///
    /// ```rust,ignore
    /// let settings = config::Settings::from_config(None::<&path::Path>)?;
    /// println!("{}", settings);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let settings = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())?
        } else {
            let settings = Self::default();
            settings.write_config(&config_path)?;
            settings
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Serialize and write settings to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), Error> {
        const MIN_INTERVAL_MS: u64 = netcheck::MIN_POLL_INTERVAL.as_millis() as u64;
        const MAX_INTERVAL_MS: u64 = 86_400_000; // 24 hours
        const MAX_TIMEOUT_MS: u64 = 60_000;

        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.poll.interval_ms) {
            return Err(Error::Invalid {
                field: "poll.interval_ms",
                reason: format!("must be between {MIN_INTERVAL_MS} and {MAX_INTERVAL_MS}"),
            });
        }

        if !(1..=MAX_TIMEOUT_MS).contains(&self.probe.timeout_ms) {
            return Err(Error::Invalid {
                field: "probe.timeout_ms",
                reason: format!("must be between 1 and {MAX_TIMEOUT_MS}"),
            });
        }

        if self.probe.port == 0 {
            return Err(Error::Invalid {
                field: "probe.port",
                reason: "port 0 is not valid".into(),
            });
        }

        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll.interval_ms),
            stop_grace: Duration::from_millis(self.poll.stop_grace_ms),
        }
    }

    pub fn prober(&self) -> TcpProber {
        TcpProber::new(self.probe.port, Duration::from_millis(self.probe.timeout_ms))
    }

    /// Let $NETCHECK_DEVICES replace the device path from the settings file.
    /// Command line flags are applied after this and win over both.
    pub fn apply_env(&mut self) {
        self.override_devices(env::var_os(DEVICES_ENV));
    }

    fn override_devices(&mut self, value: Option<OsString>) {
        if let Some(path) = value.filter(|value| !value.is_empty()) {
            self.paths.devices = Some(path.into());
        }
    }

    /// Configured device path, or ~/Documents/network-checker/config.json
    pub fn devices_path(&self) -> Result<path::PathBuf, Error> {
        match &self.paths.devices {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("config.json")),
        }
    }

    pub fn log_path(&self) -> Result<path::PathBuf, Error> {
        match &self.paths.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("app.log")),
        }
    }
}
