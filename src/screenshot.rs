//! Keeping screenshots: plain snapshots, resized copies and cropped regions.

use std::{path::PathBuf, time::Duration};

use at_controller::Point;
use image::imageops::FilterType;
use tracing::info;

use crate::{
    AutoTap,
    capture::Capture,
    error::{Error, Result},
    layout::{RootKey, now, png_name, timestamp_prefix},
};

/// Where a screenshot is read from and where the result is written to.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub name: String,
    pub load_root: RootKey,
    pub load_name: String,
    pub save_root: RootKey,
    pub save_subdir: String,
    /// Take a new screenshot into the load path first
    pub refresh: bool,
    pub screenshot_wait: Duration,
    /// Resize factor in `(0, 1]`
    pub compression: f32,
    /// Prefix the saved name with a timestamp
    pub add_time: bool,
}

impl SaveOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            load_root: RootKey::Tmp,
            load_name: "tmp0".to_string(),
            save_root: RootKey::Save,
            save_subdir: String::new(),
            refresh: true,
            screenshot_wait: Duration::from_millis(100),
            compression: 1.0,
            add_time: false,
        }
    }

    pub fn with_save_dir(mut self, root: RootKey, subdir: &str) -> Self {
        self.save_root = root;
        self.save_subdir = subdir.to_string();
        self
    }
    pub fn with_load(mut self, root: RootKey, name: &str) -> Self {
        self.load_root = root;
        self.load_name = name.to_string();
        self
    }
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
    pub fn with_screenshot_wait(mut self, wait: Duration) -> Self {
        self.screenshot_wait = wait;
        self
    }
    pub fn with_compression(mut self, compression: f32) -> Self {
        self.compression = compression;
        self
    }
    pub fn with_add_time(mut self, add_time: bool) -> Self {
        self.add_time = add_time;
        self
    }
}

/// A region of a screenshot, from `upper_left` (inclusive) to `lower_right` (exclusive).
#[derive(Debug, Clone)]
pub struct CropOptions {
    pub save: SaveOptions,
    pub upper_left: Point,
    pub lower_right: Point,
}

impl CropOptions {
    /// Crop the last screenshot without taking a new one, unless `save.refresh` is set.
    pub fn new(name: &str, upper_left: Point, lower_right: Point) -> Self {
        Self {
            save: SaveOptions::new(name).with_refresh(false),
            upper_left,
            lower_right,
        }
    }

    pub fn with_save(mut self, save: SaveOptions) -> Self {
        self.save = save;
        self
    }
}

impl AutoTap {
    /// A fresh screenshot, saved as `filename` in the tmp root when given.
    pub fn snapshot(&self, filename: Option<&str>) -> Result<Capture> {
        let path = filename.map(|name| self.layout().path(RootKey::Tmp, "", name));
        self.capture_source().fresh(path.as_deref())
    }

    fn load(&self, options: &SaveOptions) -> Result<Capture> {
        let load_path = self
            .layout()
            .path(options.load_root, "", &options.load_name);
        if options.refresh {
            std::thread::sleep(options.screenshot_wait);
            self.capture_source().fresh(Some(&load_path))
        } else {
            Capture::from_file(&load_path)
        }
    }

    fn save_path(&self, options: &SaveOptions) -> PathBuf {
        let name = if options.add_time {
            format!("{}{}", timestamp_prefix(now()), png_name(&options.name))
        } else {
            png_name(&options.name)
        };
        self.layout()
            .path(options.save_root, &options.save_subdir, &name)
    }

    /// Save a screenshot, optionally resized by `options.compression`.
    pub fn save_screenshot(&self, options: &SaveOptions) -> Result<PathBuf> {
        if !(options.compression > 0.0 && options.compression <= 1.0) {
            return Err(Error::Configuration(format!(
                "compression {} is outside of (0, 1]",
                options.compression
            )));
        }
        let capture = self.load(options)?;
        let path = self.save_path(options);

        let (width, height) = capture.resolution();
        let image = if options.compression < 1.0 {
            let w = ((width as f32 * options.compression) as u32).max(1);
            let h = ((height as f32 * options.compression) as u32).max(1);
            capture.image.resize_exact(w, h, FilterType::Triangle)
        } else {
            capture.image
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image.save(&path)?;
        info!(
            "[Screenshot]: saved {}x{} (from {width}x{height}, compression {}) to {}",
            image.width(),
            image.height(),
            options.compression,
            path.display()
        );
        Ok(path)
    }

    /// Save the region of a screenshot between the two corners.
    pub fn crop_screenshot(&self, options: &CropOptions) -> Result<PathBuf> {
        let (x, y) = options.upper_left;
        let (x2, y2) = options.lower_right;
        if x < 0 || y < 0 || x2 <= x || y2 <= y {
            return Err(Error::Configuration(format!(
                "invalid crop region {:?} -> {:?}",
                options.upper_left, options.lower_right
            )));
        }

        let capture = self.load(&options.save)?;
        let (width, height) = capture.resolution();
        let (x, y, x2, y2) = (x as u32, y as u32, x2 as u32, y2 as u32);
        if x2 > width || y2 > height {
            return Err(Error::Configuration(format!(
                "crop region {:?} -> {:?} exceeds {width}x{height}",
                options.upper_left, options.lower_right
            )));
        }

        let cropped = capture.image.crop_imm(x, y, x2 - x, y2 - y);
        let path = self.save_path(&options.save);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        cropped.save(&path)?;
        info!(
            "[Screenshot]: cropped {}x{} at {:?} from {width}x{height} to {}",
            cropped.width(),
            cropped.height(),
            options.upper_left,
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::{DynamicImage, RgbImage};

    use crate::{
        layout::ScriptLayout,
        settings::Settings,
        tests::{FakeDevice, ScriptedMatcher},
    };

    use super::*;

    fn setup(dir: &std::path::Path) -> (Arc<FakeDevice>, AutoTap) {
        let device = Arc::new(FakeDevice::new(DynamicImage::ImageRgb8(RgbImage::new(80, 60))));
        let auto_tap = AutoTap::new(
            device.clone(),
            ScriptedMatcher::new(Vec::new()),
            ScriptLayout::new(dir, "daily", "1"),
        )
        .with_settings(Settings::default().with_op_delay(Duration::ZERO));
        (device, auto_tap)
    }

    #[test]
    fn test_save_screenshot_compression() {
        let dir = tempfile::tempdir().unwrap();
        let (device, auto_tap) = setup(dir.path());

        let options = SaveOptions::new("home")
            .with_screenshot_wait(Duration::ZERO)
            .with_compression(0.5)
            .with_save_dir(RootKey::Save, "daily_report");
        let path = auto_tap.save_screenshot(&options).unwrap();
        assert_eq!(
            path,
            auto_tap
                .layout()
                .root(RootKey::Save)
                .join("daily_report/home.png")
        );
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (40, 30));
        assert_eq!(device.snapshots(), 1);

        // reuse the screenshot taken above
        let options = SaveOptions::new("home")
            .with_refresh(false)
            .with_add_time(true);
        let path = auto_tap.save_screenshot(&options).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_home.png") && name.len() > "home.png".len());
        assert_eq!(image::open(&path).unwrap().width(), 80);
        assert_eq!(device.snapshots(), 1);

        let invalid = SaveOptions::new("home").with_compression(0.0);
        assert!(matches!(
            auto_tap.save_screenshot(&invalid),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_crop_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let (_device, auto_tap) = setup(dir.path());
        auto_tap.snapshot(Some("tmp0")).unwrap();

        let path = auto_tap
            .crop_screenshot(&CropOptions::new("badge", (10, 5), (30, 25)))
            .unwrap();
        let cropped = image::open(&path).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (20, 20));

        assert!(matches!(
            auto_tap.crop_screenshot(&CropOptions::new("badge", (10, 5), (90, 25))),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            auto_tap.crop_screenshot(&CropOptions::new("badge", (10, 5), (10, 25))),
            Err(Error::Configuration(_))
        ));
    }
}
