//! Template matching driven UI automation.
//!
//! [`AutoTap`] ties a [`Device`] (from `at-controller`) and a [`Matcher`] (from `at-cv`)
//! together: it captures the screen, looks for a template, acts on a confirmed match and records
//! what it saw.
//!
//! ```ignore
//! let device = Arc::new(AdbDevice::connect("emulator-5554")?);
//! let layout = ScriptLayout::new("/data/scripts", "daily", "1");
//! let auto_tap = AutoTap::new(device, ImageprocMatcher::default(), layout);
//!
//! let res = auto_tap.tap_image("start", &CheckOptions::default(), &ActionOptions::default())?;
//! if res.applied {
//!     auto_tap.text("hello", true)?;
//! }
//! ```

use std::sync::Arc;

use color_print::cformat;
use tracing::info;

pub use at_controller as controller;
pub use at_cv as cv;

pub use controller::{AdbDevice, Device, DeviceId, DeviceRegistry, Point};
pub use cv::{ImageprocMatcher, MatchCandidate, Matcher, MatcherOptions, Target};
pub use image::DynamicImage;

pub mod capture;
pub mod dispatch;
pub mod error;
pub mod evaluate;
pub mod layout;
pub mod logging;
pub mod position;
pub mod record;
pub mod screenshot;
pub mod settings;
pub mod wait;

pub use capture::{Capture, CapturePlan, CaptureSource};
pub use dispatch::{ActionKind, ActionOptions, ActionResult, act};
pub use error::{Error, Result};
pub use evaluate::{CheckOptions, Evaluation, EvaluationOutcome, evaluate};
pub use layout::{RootKey, ScriptLayout};
pub use position::{PositionSpec, SwipeEnd};
pub use record::{BackupStore, DirBackupStore, RecordEntry, Recorder, UiSurface};
pub use screenshot::{CropOptions, SaveOptions};
pub use settings::{ScriptConfig, Settings};
pub use wait::{WaitOptions, loop_find};

/// The main entry point of automation scripts.
///
/// Holds the current device, the matcher, timing settings, the script's file layout and the
/// optional ui surface and backup store outcomes are reported to.
pub struct AutoTap {
    device: Arc<dyn Device>,
    matcher: Box<dyn Matcher>,
    settings: Settings,
    layout: ScriptLayout,
    ui: Option<Box<dyn UiSurface>>,
    backup: Option<Box<dyn BackupStore>>,
}

impl AutoTap {
    pub fn new(
        device: Arc<dyn Device>,
        matcher: impl Matcher + 'static,
        layout: ScriptLayout,
    ) -> Self {
        crate::layout::local_offset();
        Self {
            device,
            matcher: Box::new(matcher),
            settings: Settings::default(),
            layout,
            ui: None,
            backup: None,
        }
    }

    /// Build from a loaded config, backing screenshots up in the backup root when enabled.
    pub fn from_config(
        device: Arc<dyn Device>,
        matcher: impl Matcher + 'static,
        config: ScriptConfig,
    ) -> Result<Self> {
        config.settings.validate()?;
        let backup = config
            .backup_images
            .then(|| DirBackupStore::new(config.layout.root(RootKey::Backup)));
        let mut auto_tap = Self::new(device, matcher, config.layout).with_settings(config.settings);
        if let Some(backup) = backup {
            auto_tap = auto_tap.with_backup_store(backup);
        }
        Ok(auto_tap)
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_ui_surface(mut self, ui: impl UiSurface + 'static) -> Self {
        self.ui = Some(Box::new(ui));
        self
    }

    pub fn with_backup_store(mut self, backup: impl BackupStore + 'static) -> Self {
        self.backup = Some(Box::new(backup));
        self
    }

    /// Access the underlying device for low-level operations.
    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn matcher(&self) -> &dyn Matcher {
        self.matcher.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &ScriptLayout {
        &self.layout
    }

    pub fn capture_source(&self) -> CaptureSource<'_> {
        CaptureSource::new(self.device(), &self.settings)
    }

    fn recorder(&self) -> Recorder<'_> {
        Recorder::new()
            .with_ui(self.ui.as_deref())
            .with_backup(self.backup.as_deref())
    }

    /// The template `name` in the template directory of `options`.
    pub fn template(&self, name: &str, options: &CheckOptions) -> Result<Target> {
        let path = self
            .layout
            .path(options.template_root, &options.template_subdir, name);
        Ok(Target::new(path).with_threshold(self.settings.lowest_threshold)?)
    }

    /// Look for the template `name`, recording the outcome.
    pub fn check_image(&self, name: &str, options: &CheckOptions) -> Result<Evaluation> {
        let target = self.template(name, options)?;
        let paths = match options.captures_per_round {
            0 | 1 => vec![self.layout.path(
                options.screen_root,
                &options.screen_subdir,
                &options.screen_name,
            )],
            n => (0..n)
                .map(|i| {
                    self.layout
                        .path(options.screen_root, &options.screen_subdir, &format!("tmp{i}"))
                })
                .collect(),
        };
        let plan = CapturePlan {
            refresh: options.refresh,
            wait: options.screenshot_wait,
            paths,
        };

        let source = self.capture_source();
        let evaluation = evaluate(
            self.matcher(),
            &target,
            |round| source.round(&plan, round),
            options.accuracy,
            options.attempts,
        )?;
        self.recorder().record(
            "check_image",
            &target,
            &evaluation.outcome,
            options.accuracy,
            evaluation.capture.as_ref(),
        );
        Ok(evaluation)
    }

    fn act_on_image(
        &self,
        kind: ActionKind,
        name: &str,
        check: &CheckOptions,
        action: &ActionOptions,
    ) -> Result<ActionResult> {
        let evaluation = self.check_image(name, check)?;
        let res = act(self.device(), kind, &evaluation.outcome, action)?;
        let summary = if res.applied {
            cformat!(
                "<g>[AutoTap]</g>: {:?} {} at {:?}, offset {:?}, x{}",
                kind,
                name,
                res.final_position,
                action.offset,
                action.repetitions
            )
        } else {
            cformat!("<y>[AutoTap]</y>: {:?} {} skipped, not found", kind, name)
        };
        info!("{summary}");
        Ok(res)
    }

    /// Tap the template `name` if it is confirmed.
    pub fn tap_image(
        &self,
        name: &str,
        check: &CheckOptions,
        action: &ActionOptions,
    ) -> Result<ActionResult> {
        self.act_on_image(ActionKind::Tap, name, check, action)
    }

    /// Swipe from the template `name` to its offset position if it is confirmed.
    pub fn swipe_image(
        &self,
        name: &str,
        check: &CheckOptions,
        action: &ActionOptions,
    ) -> Result<ActionResult> {
        self.act_on_image(ActionKind::Swipe, name, check, action)
    }

    /// Long press the template `name` if it is confirmed, `action.offset` is ignored.
    pub fn press_image(
        &self,
        name: &str,
        check: &CheckOptions,
        action: &ActionOptions,
    ) -> Result<ActionResult> {
        let action = ActionOptions {
            offset: (0, 0),
            ..action.clone()
        };
        self.act_on_image(ActionKind::Press, name, check, &action)
    }

    /// Poll until `target` is on screen, see [`loop_find`].
    pub fn wait(
        &self,
        target: &Target,
        options: &WaitOptions,
        on_miss: Option<&mut dyn FnMut()>,
    ) -> Result<Point> {
        let candidate = loop_find(
            &self.capture_source(),
            self.matcher(),
            target,
            options,
            on_miss,
        )?;
        Ok(candidate.position)
    }

    /// Where `target` is within `find_timeout_tmp`, `None` when it never showed up.
    pub fn exists(&self, target: &Target) -> Result<Option<Point>> {
        let options = WaitOptions::new(self.settings.find_timeout_tmp);
        match self.wait(target, &options, None) {
            Ok(pos) => Ok(Some(pos)),
            Err(Error::TargetNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every occurrence of `target` on a fresh screenshot, best first.
    pub fn find_all(&self, target: &Target) -> Result<Vec<MatchCandidate>> {
        let capture = self.capture_source().fresh(None)?;
        let mut candidates = cv::match_candidates(self.matcher(), target, &capture.image);
        candidates.sort_by(|a, b| cv::compare_candidates(b, a));
        Ok(candidates)
    }

    pub fn assert_exists(&self, target: &Target, msg: &str) -> Result<Point> {
        let options = WaitOptions::new(self.settings.find_timeout);
        match self.wait(target, &options, None) {
            Ok(pos) => Ok(pos),
            Err(Error::TargetNotFound { .. }) => Err(Error::Assertion(format!(
                "{msg}: {} does not exist",
                target.id()
            ))),
            Err(err) => Err(err),
        }
    }

    pub fn assert_not_exists(&self, target: &Target, msg: &str) -> Result<()> {
        match self.exists(target)? {
            Some(pos) => Err(Error::Assertion(format!(
                "{msg}: {} exists at {pos:?}",
                target.id()
            ))),
            None => Ok(()),
        }
    }
}
