use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The polling loop timed out without a confirmed match
    #[error("target {target} not found in {timeout:?}")]
    TargetNotFound { target: String, timeout: Duration },

    /// Malformed target, settings or layout, never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Writing a backup image failed, only ever logged
    #[error("failed to write backup image {path:?}: {source}")]
    BackupWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Mirroring to the ui surface failed, only ever logged
    #[error("ui link error: {0}")]
    UiLink(String),

    #[error("assertion failed: {0}")]
    Assertion(String),

    /// The device transport failed, propagated as is
    #[error("device error: {0:#}")]
    Device(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl From<at_cv::CvError> for Error {
    fn from(value: at_cv::CvError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<at_controller::RegistryError> for Error {
    fn from(value: at_controller::RegistryError) -> Self {
        Self::Configuration(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
