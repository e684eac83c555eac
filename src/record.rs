//! Reporting evaluations.
//!
//! Every evaluation is logged once. Mirroring it to a [`UiSurface`] and keeping the screenshot
//! in a [`BackupStore`] are best effort: their failures are logged and never reach the caller.

use std::{
    fmt::Display,
    fs::OpenOptions,
    io::{BufWriter, ErrorKind},
    path::{Path, PathBuf},
};

use at_cv::Target;
use image::{DynamicImage, ImageFormat};
use tracing::{info, warn};

use crate::{
    capture::Capture,
    error::Error,
    evaluate::EvaluationOutcome,
    layout::{png_name, timestamp_prefix},
};

/// A small panel mirroring what the script is doing.
pub trait UiSurface {
    fn show_message(&self, message: &str) -> anyhow::Result<()>;
    fn show_image(&self, path: &Path) -> anyhow::Result<()>;
}

/// Somewhere to keep evaluated screenshots.
pub trait BackupStore {
    /// Write `image` as `name`, never replacing an existing file. Returns the written path.
    fn save(&self, name: &str, image: &DynamicImage) -> anyhow::Result<PathBuf>;
}

/// Backups as png files in a directory, `-1`, `-2`, ... is appended on a name collision.
pub struct DirBackupStore {
    dir: PathBuf,
}

impl DirBackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BackupStore for DirBackupStore {
    fn save(&self, name: &str, image: &DynamicImage) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let stem = name.strip_suffix(".png").unwrap_or(name);
        for n in 0u32.. {
            let path = match n {
                0 => self.dir.join(png_name(stem)),
                n => self.dir.join(format!("{stem}-{n}.png")),
            };
            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };
            image.write_to(&mut BufWriter::new(file), ImageFormat::Png)?;
            return Ok(path);
        }
        anyhow::bail!("no free backup name for {stem}")
    }
}

/// The confidence as logged: the value, or the floor it did not reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Value(f32),
    BelowFloor(f32),
}

impl Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Value(c) => write!(f, "{c:.4}"),
            Confidence::BelowFloor(floor) => write!(f, "below_{floor}"),
        }
    }
}

/// What was logged for one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    pub method: &'static str,
    pub template: String,
    pub confidence: Confidence,
    pub accuracy: f32,
    pub result: bool,
    /// The backup written for this evaluation
    pub backup: Option<PathBuf>,
}

impl RecordEntry {
    /// `{timestamp}{template}_{confidence}_{result}.png`
    pub fn backup_name(&self, capture: &Capture) -> String {
        format!(
            "{}{}_{}_{}.png",
            timestamp_prefix(capture.taken_at),
            self.template,
            self.confidence,
            if self.result { "True" } else { "False" }
        )
    }
}

impl Display for RecordEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: template: {}, confidence: {}, accuracy: {:.4}, result: {}",
            self.method, self.template, self.confidence, self.accuracy, self.result
        )
    }
}

#[derive(Default)]
pub struct Recorder<'a> {
    ui: Option<&'a dyn UiSurface>,
    backup: Option<&'a dyn BackupStore>,
}

impl<'a> Recorder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ui(mut self, ui: Option<&'a dyn UiSurface>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_backup(mut self, backup: Option<&'a dyn BackupStore>) -> Self {
        self.backup = backup;
        self
    }

    /// Log `outcome`, mirror it to the ui and back `capture` up.
    pub fn record(
        &self,
        method: &'static str,
        target: &Target,
        outcome: &EvaluationOutcome,
        accuracy: f32,
        capture: Option<&Capture>,
    ) -> RecordEntry {
        let confidence = match outcome.candidate() {
            Some(candidate) => Confidence::Value(candidate.confidence),
            None => Confidence::BelowFloor(target.threshold()),
        };
        let mut entry = RecordEntry {
            method,
            template: target.id(),
            confidence,
            accuracy,
            result: outcome.is_confirmed(),
            backup: None,
        };

        info!(
            method,
            template = %entry.template,
            confidence = %entry.confidence,
            accuracy,
            result = entry.result,
            "{entry}"
        );

        if let Some(ui) = self.ui {
            let message = entry.to_string().replace([',', ':'], "\n");
            let res = ui
                .show_message(&message)
                .and_then(|_| ui.show_image(target.path()));
            if let Err(err) = res {
                warn!("{}", Error::UiLink(format!("{err:#}")));
            }
        }

        if let (Some(backup), Some(capture)) = (self.backup, capture) {
            let name = entry.backup_name(capture);
            match backup.save(&name, &capture.image) {
                Ok(path) => entry.backup = Some(path),
                Err(source) => warn!(
                    "{}",
                    Error::BackupWrite {
                        path: PathBuf::from(name),
                        source
                    }
                ),
            }
        }

        entry
    }
}
