//! Screen captures.
//!
//! A [`Capture`] is taken fresh from the device, or read back from a screenshot saved earlier.
//! [`CaptureSource::round`] produces the captures of one evaluation round according to a
//! [`CapturePlan`].

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use at_controller::{Device, SnapshotOptions};
use image::DynamicImage;
use time::OffsetDateTime;
use tracing::trace;

use crate::{
    error::{Error, Result},
    layout::now,
    settings::Settings,
};

/// One screen image, never modified after it was taken.
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: DynamicImage,
    pub taken_at: OffsetDateTime,
    /// The file the image was saved to or read from
    pub source: Option<PathBuf>,
    pub quality: Option<u8>,
    /// The longest edge the saved file was constrained to
    pub max_size: Option<u32>,
}

impl Capture {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            taken_at: now(),
            source: None,
            quality: None,
            max_size: None,
        }
    }

    /// Read a screenshot saved earlier.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            ..Self::new(image)
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// How the captures of every evaluation round are obtained.
#[derive(Debug, Clone)]
pub struct CapturePlan {
    /// Take new screenshots instead of reading `paths` back
    pub refresh: bool,
    /// Sleep before capturing, once per round with a single path, once in total otherwise
    pub wait: Duration,
    /// One path per capture of a round
    pub paths: Vec<PathBuf>,
}

impl CapturePlan {
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            refresh: true,
            wait: Duration::ZERO,
            paths: vec![path.into()],
        }
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }
}

/// Takes screenshots from a device with the configured quality and size.
pub struct CaptureSource<'a> {
    device: &'a dyn Device,
    quality: u8,
    max_size: Option<u32>,
}

impl<'a> CaptureSource<'a> {
    pub fn new(device: &'a dyn Device, settings: &Settings) -> Self {
        Self {
            device,
            quality: settings.snapshot_quality,
            max_size: settings.image_max_size,
        }
    }

    /// A new screenshot, also saved to `path` when given.
    pub fn fresh(&self, path: Option<&Path>) -> Result<Capture> {
        let mut options = SnapshotOptions::new()
            .with_quality(self.quality)
            .with_max_size(self.max_size);
        if let Some(path) = path {
            options = options.with_path(path);
        }
        let image = self.device.snapshot(&options).map_err(Error::Device)?;
        trace!(
            "[CaptureSource]: captured {}x{} from {}",
            image.width(),
            image.height(),
            self.device.uuid()
        );
        Ok(Capture {
            source: path.map(Path::to_path_buf),
            quality: Some(self.quality),
            max_size: self.max_size,
            ..Capture::new(image)
        })
    }

    /// The captures of round `round`, counted from zero.
    ///
    /// With a single path the screen is captured again (or the file read back when `refresh`
    /// is off) every round. With several paths every round takes one fresh screenshot per path.
    pub fn round(&self, plan: &CapturePlan, round: usize) -> Result<Vec<Capture>> {
        match plan.paths.as_slice() {
            [] => Err(Error::Configuration(
                "a capture plan needs at least one path".to_string(),
            )),
            [path] if plan.refresh => {
                std::thread::sleep(plan.wait);
                Ok(vec![self.fresh(Some(path))?])
            }
            [path] => Ok(vec![Capture::from_file(path)?]),
            paths => {
                if round == 0 {
                    std::thread::sleep(plan.wait);
                }
                paths.iter().map(|path| self.fresh(Some(path))).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::FakeDevice;

    use super::*;

    #[test]
    fn test_fresh_capture() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new(DynamicImage::new_rgb8(64, 32));
        let settings = Settings::default().with_image_max_size(Some(16));
        let source = CaptureSource::new(&device, &settings);

        let path = dir.path().join("tmp0.png");
        let capture = source.fresh(Some(&path)).unwrap();
        assert_eq!(capture.resolution(), (64, 32));
        assert_eq!(capture.source.as_deref(), Some(path.as_path()));
        assert_eq!(capture.quality, Some(10));
        assert_eq!(capture.max_size, Some(16));
        assert!(path.is_file());

        // the file is constrained, the capture keeps the device resolution
        let capture = Capture::from_file(&path).unwrap();
        assert_eq!(capture.resolution(), (16, 8));
        assert!(Capture::from_file(dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new(DynamicImage::new_rgb8(8, 8));
        let settings = Settings::default();
        let source = CaptureSource::new(&device, &settings);

        let single = CapturePlan::single(dir.path().join("tmp0.png"));
        assert_eq!(source.round(&single, 0).unwrap().len(), 1);
        assert_eq!(source.round(&single, 1).unwrap().len(), 1);
        assert_eq!(device.snapshots(), 2);

        // reads back the file written above
        let stale = single.clone().with_refresh(false);
        assert_eq!(source.round(&stale, 0).unwrap().len(), 1);
        assert_eq!(device.snapshots(), 2);

        let multi = single.with_paths(
            (0..3)
                .map(|i| dir.path().join(format!("tmp{i}.png")))
                .collect(),
        );
        assert_eq!(source.round(&multi, 0).unwrap().len(), 3);
        assert_eq!(device.snapshots(), 5);

        let empty = CapturePlan::single("x.png").with_paths(Vec::new());
        assert!(matches!(
            source.round(&empty, 0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_device_error_propagates() {
        let device = FakeDevice::new(DynamicImage::new_rgb8(8, 8));
        device.fail_snapshots();
        let settings = Settings::default();
        let source = CaptureSource::new(&device, &settings);
        assert!(matches!(source.fresh(None), Err(Error::Device(_))));
    }
}
