use crate::error::CommonResult;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::{ops::Deref, sync::Arc, time::Duration};

#[derive(Debug, Clone)]
pub struct Settings(Arc<Inner>);

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Settings {
    /// Load settings from `config_path` (optional, format inferred from the
    /// extension) overlaid with `PLCTAG__`-prefixed environment variables,
    /// e.g. `PLCTAG__DEVICE__TIMEOUT_MS=2000`.
    pub fn new(config_path: &str) -> CommonResult<Self> {
        let builder = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("PLCTAG")
                    .separator("__")
                    .try_parsing(true),
            );
        let inner: Inner = builder.build()?.try_deserialize()?;
        Ok(Self(Arc::new(inner)))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self(Arc::new(Inner::default()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSettings {
    /// Transport attribute string shared by every tag of the device.
    ///
    /// The tag qualifier (`&name=<tag>`) is appended per tag, so this must not
    /// contain a `name` attribute itself.
    #[serde(default = "DeviceSettings::connection_default")]
    pub connection: String,
    /// Timeout applied to handle creation, reads and writes.
    #[serde(default = "DeviceSettings::timeout_ms_default")]
    pub timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            connection: DeviceSettings::connection_default(),
            timeout_ms: DeviceSettings::timeout_ms_default(),
        }
    }
}

impl DeviceSettings {
    fn connection_default() -> String {
        "protocol=ab-eip&gateway=127.0.0.1&path=1,0&plc=ControlLogix".into()
    }

    fn timeout_ms_default() -> u64 {
        5000
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "LogSettings::level_default")]
    pub level: String,
    /// Directory for the daily rolling log file. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: LogSettings::level_default(),
            directory: None,
        }
    }
}

impl LogSettings {
    fn level_default() -> String {
        "info".into()
    }
}
