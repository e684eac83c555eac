//! Where a script keeps its files.
//!
//! A script owns five directories under `current_path`: temporary screenshots, template icons,
//! saved screenshots, backups of evaluated screenshots and log files. Every directory except the
//! icon one is scoped by the device number, so several devices can run the same script side by
//! side.

use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset, macros::format_description};
use tracing::debug;

use crate::error::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RootKey {
    #[serde(rename = "tmp_root")]
    Tmp,
    #[serde(rename = "icon_root")]
    Icon,
    #[serde(rename = "save_root")]
    Save,
    #[serde(rename = "backup_root")]
    Backup,
    #[serde(rename = "log_root")]
    Log,
}

impl RootKey {
    pub const ALL: [RootKey; 5] = [
        RootKey::Tmp,
        RootKey::Icon,
        RootKey::Save,
        RootKey::Backup,
        RootKey::Log,
    ];
}

impl Display for RootKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RootKey::Tmp => "tmp_root",
            RootKey::Icon => "icon_root",
            RootKey::Save => "save_root",
            RootKey::Backup => "backup_root",
            RootKey::Log => "log_root",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptLayout {
    pub current_path: PathBuf,
    pub script_name: String,
    pub device_num: String,
    /// Overrides of the default relative root directories
    #[serde(default)]
    pub roots: BTreeMap<RootKey, PathBuf>,
}

impl ScriptLayout {
    pub fn new(
        current_path: impl Into<PathBuf>,
        script_name: impl Into<String>,
        device_num: impl Into<String>,
    ) -> Self {
        Self {
            current_path: current_path.into(),
            script_name: script_name.into(),
            device_num: device_num.into(),
            roots: BTreeMap::new(),
        }
    }

    pub fn with_root(mut self, key: RootKey, relative: impl Into<PathBuf>) -> Self {
        self.roots.insert(key, relative.into());
        self
    }

    /// The root of `key` relative to `current_path`, before the device number is applied.
    pub fn relative_root(&self, key: RootKey) -> PathBuf {
        if let Some(root) = self.roots.get(&key) {
            return root.clone();
        }
        let script = self.script_name.as_str();
        match key {
            RootKey::Tmp => PathBuf::from("tmp"),
            RootKey::Icon => Path::new("icon").join(script),
            RootKey::Save => Path::new("storage").join(script),
            RootKey::Backup => Path::new("backup").join(script),
            RootKey::Log => Path::new("log").join(script),
        }
    }

    /// The resolved directory of `key`.
    pub fn root(&self, key: RootKey) -> PathBuf {
        let relative = self.relative_root(key);
        match key {
            RootKey::Icon => self.current_path.join(relative),
            _ => self.current_path.join(&self.device_num).join(relative),
        }
    }

    /// `<root>/<subdir>/<name>.png`, `subdir` may be empty.
    pub fn path(&self, key: RootKey, subdir: &str, name: &str) -> PathBuf {
        let mut path = self.root(key);
        if !subdir.is_empty() {
            path.push(subdir);
        }
        path.join(png_name(name))
    }

    /// Create every missing root directory, returning the resolved roots.
    pub fn setup(&self) -> Result<BTreeMap<RootKey, PathBuf>> {
        let mut roots = BTreeMap::new();
        for key in RootKey::ALL {
            let root = self.root(key);
            if !root.exists() {
                debug!("[ScriptLayout]: creating {key} at {}", root.display());
                std::fs::create_dir_all(&root)?;
            }
            roots.insert(key, root);
        }
        Ok(roots)
    }
}

/// Append `.png` to `name` unless it already ends with it.
pub fn png_name(name: &str) -> String {
    if name.ends_with(".png") {
        name.to_string()
    } else {
        format!("{name}.png")
    }
}

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// The local offset from UTC, determined once by the first call.
///
/// `time` only reads the local offset while the process has a single thread, so this is called
/// by the logging installers and [`crate::AutoTap::new`]. When the first call already happens
/// on a multi threaded process every timestamp stays in UTC.
pub fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| {
        UtcOffset::current_local_offset().unwrap_or_else(|err| {
            debug!("[ScriptLayout]: local offset unavailable, using UTC: {err}");
            UtcOffset::UTC
        })
    })
}

/// The current time in [`local_offset`].
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// `YYYY-MM-DD_HH_MM_SS_`, prepended to the names of backups, saved screenshots and logs.
pub fn timestamp_prefix(t: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]_[hour]_[minute]_[second]_");
    t.format(format)
        .unwrap_or_else(|_| format!("{}_", t.unix_timestamp()))
}
