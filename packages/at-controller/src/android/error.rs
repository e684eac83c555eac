use thiserror::Error;

/// Errors of the `adb` command line backed device
#[derive(Error, Debug)]
pub enum AdbError {
    /// IO error, usually the `adb` binary is missing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// `adb` exited with a non-zero status
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Unexpected output from `adb`
    #[error("Parse error: {0}")]
    ParseError(String),

    /// UTF-8 decode error
    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

pub type AdbResult<T> = Result<T, AdbError>;
