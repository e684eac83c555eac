//! Global `tracing` subscribers.
//!
//! Both installers use `try_init`, so calling them after another subscriber was set only logs a
//! warning. The level is read from `RUST_LOG` and defaults to `INFO`.

use std::{fs::File, path::PathBuf, sync::Mutex};

use time::macros::format_description;
use tracing::{Subscriber, info, warn};
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self, time::FormatTime, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{
    error::Result,
    layout::{RootKey, ScriptLayout, local_offset, now, timestamp_prefix},
};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

fn file_timer() -> impl FormatTime {
    OffsetTime::new(local_offset(), format_description!("[hour]:[minute]:[second]"))
}

/// Console logging only.
pub fn init_tracing_subscriber() {
    local_offset();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
    {
        warn!("[Logging]: subscriber not installed: {err}");
    }
}

/// Console logging plus plain lines without colors written to `file`.
pub fn log_file_subscriber(file: File) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_thread_names(true)
                .with_timer(file_timer())
                .with_writer(Mutex::new(file)),
        )
}

/// Create `<log_root>/<timestamp><script_name>.txt` and log to it from now on.
pub fn setup_log_file(layout: &ScriptLayout) -> Result<PathBuf> {
    let dir = layout.root(RootKey::Log);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!(
        "{}{}.txt",
        timestamp_prefix(now()),
        layout.script_name
    ));
    let file = File::create(&path)?;

    match log_file_subscriber(file).try_init() {
        Ok(()) => info!("[Logging]: logging to {}", path.display()),
        Err(err) => warn!(
            "[Logging]: subscriber not installed, {} stays empty: {err}",
            path.display()
        ),
    }
    Ok(path)
}
