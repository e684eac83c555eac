//! Device side of auto-tap.
//!
//! [`Device`] is everything the automation core needs from a device: screenshots, touches,
//! swipes, key events and text input. [`AdbDevice`] drives an Android device through the
//! `adb` binary, and [`DeviceRegistry`] keeps the connected devices and which one is current.

use std::{borrow::Cow, fs::File, io::BufWriter, path::PathBuf, time::Duration};

use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder};

pub mod android;
pub mod registry;

pub use android::{AdbDevice, AdbError, AdbResult};
pub use registry::{DeviceId, DeviceRegistry, RegistryError};

/// A position on the device screen, in device pixels.
pub type Point = (i32, i32);

/// Options for [`Device::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Also write the screenshot to this path
    pub path: Option<PathBuf>,
    /// Encoding quality in `1..=99`, only used for jpeg files
    pub quality: Option<u8>,
    /// Constrain the longest edge of the saved file to this size
    pub max_size: Option<u32>,
}

impl SnapshotOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }
    pub fn with_max_size(mut self, max_size: Option<u32>) -> Self {
        self.max_size = max_size;
        self
    }
}

/// A device, responsible for the operations like touch, swipe, snapshot, etc.
pub trait Device {
    /// Serial number, window handle or udid of the device
    fn uuid(&self) -> String;

    /// Take a screenshot, saved according to `options`.
    ///
    /// The returned image always has the device resolution, so that positions found in it
    /// are device positions. Only the saved file is constrained to `options.max_size`.
    fn snapshot(&self, options: &SnapshotOptions) -> anyhow::Result<DynamicImage>;

    fn touch(&self, pos: Point) -> anyhow::Result<()>;

    fn double_click(&self, pos: Point) -> anyhow::Result<()> {
        self.touch(pos)?;
        std::thread::sleep(Duration::from_millis(50));
        self.touch(pos)
    }

    fn swipe(&self, from: Point, to: Point, duration: Duration) -> anyhow::Result<()>;

    /// Inject a platform specific key, e.g. `HOME` or `KEYCODE_DEL` on Android
    fn keyevent(&self, name: &str) -> anyhow::Result<()>;

    /// Type `text` into the focused widget, optionally followed by `Enter`
    fn text(&self, text: &str, enter: bool) -> anyhow::Result<()>;

    fn shell(&self, cmd: &str) -> anyhow::Result<String>;

    /// The current screen resolution in pixels, orientation applied
    fn current_resolution(&self) -> anyhow::Result<(u32, u32)>;

    fn home(&self) -> anyhow::Result<()> {
        self.keyevent("HOME")
    }

    fn wake(&self) -> anyhow::Result<()> {
        self.keyevent("WAKEUP")
    }
}

/// Downscale `image` so that its longest edge does not exceed `max_size`.
pub fn constrain_size(image: &DynamicImage, max_size: Option<u32>) -> Cow<'_, DynamicImage> {
    match max_size {
        Some(max_size) if max_size > 0 && image.width().max(image.height()) > max_size => {
            let resized = image.resize(max_size, max_size, image::imageops::FilterType::Triangle);
            Cow::Owned(resized)
        }
        _ => Cow::Borrowed(image),
    }
}

/// Write a snapshot to `options.path` if there is one, constrained to `options.max_size` and
/// honouring `options.quality` when the path is a jpeg file.
pub fn save_snapshot(image: &DynamicImage, options: &SnapshotOptions) -> anyhow::Result<()> {
    let Some(path) = &options.path else {
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let image = constrain_size(image, options.max_size);
    match (ImageFormat::from_path(path), options.quality) {
        (Ok(ImageFormat::Jpeg), Some(quality)) => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 99));
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
        (Ok(ImageFormat::Jpeg), None) => DynamicImage::ImageRgb8(image.to_rgb8()).save(path)?,
        _ => image.save(path)?,
    }
    Ok(())
}
