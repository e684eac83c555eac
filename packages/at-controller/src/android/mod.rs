//! An Android [`Device`] driven through the `adb` command line tool.

use std::{
    io::Cursor,
    path::PathBuf,
    process::Command,
    sync::OnceLock,
    time::Duration,
};

use color_print::cformat;
use image::{DynamicImage, codecs::png::PngDecoder};
use regex::Regex;
use tracing::{debug, info, trace};

use crate::{Device, Point, SnapshotOptions, save_snapshot};

mod error;

pub use error::{AdbError, AdbResult};

/// A line of `adb devices`
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub serial: String,
    pub state: String,
}

/// Parse the output of `adb devices`, skipping the header and blank lines.
pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(serial), Some(state)) => Some(DeviceInfo {
                    serial: serial.to_string(),
                    state: state.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Parse the output of `wm size`.
///
/// An `Override size` line wins over the `Physical size` line.
pub fn parse_wm_size(output: &str) -> AdbResult<(u32, u32)> {
    static SIZE: OnceLock<Regex> = OnceLock::new();
    let re = SIZE.get_or_init(|| Regex::new(r"(Physical|Override) size:\s*(\d+)x(\d+)").unwrap());

    let mut physical = None;
    let mut overridden = None;
    for caps in re.captures_iter(output) {
        let size = (
            caps[2]
                .parse::<u32>()
                .map_err(|err| AdbError::ParseError(err.to_string()))?,
            caps[3]
                .parse::<u32>()
                .map_err(|err| AdbError::ParseError(err.to_string()))?,
        );
        match &caps[1] {
            "Override" => overridden = Some(size),
            _ => physical = Some(size),
        }
    }
    overridden
        .or(physical)
        .ok_or_else(|| AdbError::ParseError(format!("no screen size in {output:?}")))
}

/// Quote `text` for `input text`, spaces become `%s`.
pub fn escape_input_text(text: &str) -> String {
    let text = text.replace(' ', "%s").replace('\'', r"'\''");
    format!("'{text}'")
}

/// A device reached by `adb -s <serial>`.
pub struct AdbDevice {
    adb: PathBuf,
    serial: String,
}

impl AdbDevice {
    /// Connect to `serial`, running `adb connect` first for network serials.
    ///
    /// Returns [`AdbError::DeviceNotFound`] if the serial is not listed as a ready device.
    pub fn connect(serial: &str) -> AdbResult<Self> {
        Self::connect_with(PathBuf::from("adb"), serial)
    }

    pub fn connect_with(adb: impl Into<PathBuf>, serial: &str) -> AdbResult<Self> {
        let adb = adb.into();
        if serial.contains(':') {
            let output = Command::new(&adb).args(["connect", serial]).output()?;
            debug!(
                "adb connect {serial}: {}",
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }

        let output = Command::new(&adb).arg("devices").output()?;
        let devices = parse_devices(&String::from_utf8(output.stdout)?);
        if !devices
            .iter()
            .any(|info| info.serial == serial && info.state == "device")
        {
            return Err(AdbError::DeviceNotFound(serial.to_string()));
        }
        info!("{}", cformat!("<g>[AdbDevice]</g>: connected to {serial}"));
        Ok(Self::from_serial_with(adb, serial))
    }

    /// Use `serial` without checking that it is connected.
    pub fn from_serial(serial: &str) -> Self {
        Self::from_serial_with(PathBuf::from("adb"), serial)
    }

    pub fn from_serial_with(adb: impl Into<PathBuf>, serial: &str) -> Self {
        Self {
            adb: adb.into(),
            serial: serial.to_string(),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// `adb -s <self.serial> <args>`
    pub fn execute_command_by_process(&self, args: &[&str]) -> AdbResult<Vec<u8>> {
        trace!("adb -s {} {}", self.serial, args.join(" "));
        let output = Command::new(&self.adb)
            .arg("-s")
            .arg(&self.serial)
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed(format!(
                "adb -s {} {}: {}",
                self.serial,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    /// `adb -s <self.serial> shell <command>`
    pub fn shell_command(&self, command: &str) -> AdbResult<String> {
        let bytes = self.execute_command_by_process(&["shell", command])?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Get the raw png screencap data in bytes
    pub fn raw_screencap(&self) -> AdbResult<Vec<u8>> {
        self.execute_command_by_process(&["exec-out", "screencap", "-p"])
    }

    /// Get the decoded screencap image
    pub fn screencap(&self) -> AdbResult<DynamicImage> {
        let bytes = self.raw_screencap()?;
        let decoder = PngDecoder::new(Cursor::new(bytes))?;
        Ok(DynamicImage::from_decoder(decoder)?)
    }
}

impl Device for AdbDevice {
    fn uuid(&self) -> String {
        self.serial.clone()
    }

    fn snapshot(&self, options: &SnapshotOptions) -> anyhow::Result<DynamicImage> {
        let screen = self.screencap()?;
        save_snapshot(&screen, options)?;
        Ok(screen)
    }

    fn touch(&self, (x, y): Point) -> anyhow::Result<()> {
        self.shell_command(&format!("input tap {x} {y}"))?;
        Ok(())
    }

    fn swipe(&self, (x1, y1): Point, (x2, y2): Point, duration: Duration) -> anyhow::Result<()> {
        self.shell_command(&format!(
            "input swipe {x1} {y1} {x2} {y2} {}",
            duration.as_millis()
        ))?;
        Ok(())
    }

    fn keyevent(&self, name: &str) -> anyhow::Result<()> {
        self.shell_command(&format!("input keyevent {name}"))?;
        Ok(())
    }

    fn text(&self, text: &str, enter: bool) -> anyhow::Result<()> {
        self.shell_command(&format!("input text {}", escape_input_text(text)))?;
        if enter {
            self.keyevent("ENTER")?;
        }
        Ok(())
    }

    fn shell(&self, cmd: &str) -> anyhow::Result<String> {
        Ok(self.shell_command(cmd)?)
    }

    fn current_resolution(&self) -> anyhow::Result<(u32, u32)> {
        let output = self.shell_command("wm size")?;
        Ok(parse_wm_size(&output)?)
    }
}
