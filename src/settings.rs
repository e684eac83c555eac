//! Timing, capture and matching settings of a script, loaded from a `toml` file.
//!
//! ```toml
//! backup_images = true
//!
//! [settings]
//! find_timeout = 20.0
//! op_delay = 0.1
//!
//! [layout]
//! current_path = "/sdcard/scripts"
//! script_name = "daily"
//! device_num = "1"
//! ```

use std::{path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    error::{Error, Result},
    layout::ScriptLayout,
};

#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timeout of [`crate::AutoTap::wait`] and position resolution
    #[serde(with = "duration_secs")]
    pub find_timeout: Duration,
    /// Timeout of [`crate::AutoTap::exists`]
    #[serde(with = "duration_secs")]
    pub find_timeout_tmp: Duration,
    /// Jpeg quality of saved screenshots, `1..=99`
    pub snapshot_quality: u8,
    /// Longest edge of screenshots, unconstrained when missing
    pub image_max_size: Option<u32>,
    /// Sleep after every direct device operation
    #[serde(with = "duration_secs")]
    pub op_delay: Duration,
    /// Delay between the touches of a multi touch
    #[serde(with = "duration_secs")]
    pub touch_interval: Duration,
    /// Minimum confidence the matcher reports at all
    pub lowest_threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            find_timeout: Duration::from_secs(20),
            find_timeout_tmp: Duration::from_secs(3),
            snapshot_quality: 10,
            image_max_size: None,
            op_delay: Duration::from_millis(100),
            touch_interval: Duration::from_millis(50),
            lowest_threshold: 0.6,
        }
    }
}

impl Settings {
    pub fn with_find_timeout(mut self, timeout: Duration) -> Self {
        self.find_timeout = timeout;
        self
    }
    pub fn with_find_timeout_tmp(mut self, timeout: Duration) -> Self {
        self.find_timeout_tmp = timeout;
        self
    }
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }
    pub fn with_touch_interval(mut self, interval: Duration) -> Self {
        self.touch_interval = interval;
        self
    }
    pub fn with_image_max_size(mut self, max_size: Option<u32>) -> Self {
        self.image_max_size = max_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=99).contains(&self.snapshot_quality) {
            return Err(Error::Configuration(format!(
                "snapshot_quality {} is outside of 1..=99",
                self.snapshot_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.lowest_threshold) {
            return Err(Error::Configuration(format!(
                "lowest_threshold {} is outside of [0, 1]",
                self.lowest_threshold
            )));
        }
        Ok(())
    }
}

/// Everything a script needs besides its device and matcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default)]
    pub settings: Settings,
    pub layout: ScriptLayout,
    /// Keep every evaluated screenshot in the backup root
    #[serde(default)]
    pub backup_images: bool,
}

impl ScriptConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl FromStr for ScriptConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: ScriptConfig = toml::from_str(s)?;
        config.settings.validate()?;
        Ok(config)
    }
}

// Durations are written as seconds, e.g. `op_delay = 0.1`
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::RootKey;

    use super::*;

    #[test]
    fn test_parse_script_config() {
        let config: ScriptConfig = r#"
            backup_images = true

            [settings]
            find_timeout = 5.0
            op_delay = 0.25
            image_max_size = 1200

            [layout]
            current_path = "/tmp/scripts"
            script_name = "daily"
            device_num = "2"

            [layout.roots]
            save_root = "saved"
        "#
        .parse()
        .unwrap();

        assert!(config.backup_images);
        assert_eq!(config.settings.find_timeout, Duration::from_secs(5));
        assert_eq!(config.settings.op_delay, Duration::from_millis(250));
        assert_eq!(config.settings.image_max_size, Some(1200));
        // untouched fields keep their defaults
        assert_eq!(config.settings.find_timeout_tmp, Duration::from_secs(3));
        assert_eq!(config.settings.lowest_threshold, 0.6);

        assert_eq!(config.layout.script_name, "daily");
        assert_eq!(
            config.layout.root(RootKey::Save),
            Path::new("/tmp/scripts/2/saved")
        );
    }

    #[test]
    fn test_invalid_settings() {
        let layout = r#"
            [layout]
            current_path = "."
            script_name = "s"
            device_num = "1"
        "#;

        let err = format!("[settings]\nsnapshot_quality = 0\n{layout}")
            .parse::<ScriptConfig>()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = format!("[settings]\nlowest_threshold = 1.5\n{layout}")
            .parse::<ScriptConfig>()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = format!("[settings]\nop_delay = -1.0\n{layout}")
            .parse::<ScriptConfig>()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(matches!(
            "backup_images = true".parse::<ScriptConfig>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_serde_settings() {
        let settings = Settings::default().with_op_delay(Duration::from_millis(500));
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(!toml.contains("image_max_size"));
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }
}
