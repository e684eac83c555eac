//! Direct device operations on literal or visually located positions.
//!
//! Every operation resolves its positions once, before touching the device, and sleeps the
//! configured `op_delay` afterwards.

use std::time::Duration;

use at_controller::Point;
use at_cv::Target;
use tracing::debug;

use crate::{
    AutoTap,
    dispatch::offset_position,
    error::{Error, Result},
    wait::WaitOptions,
};

/// A position given either directly or as a template to look for.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionSpec {
    Literal(Point),
    Visual(Target),
}

impl From<Point> for PositionSpec {
    fn from(value: Point) -> Self {
        Self::Literal(value)
    }
}

impl From<Target> for PositionSpec {
    fn from(value: Target) -> Self {
        Self::Visual(value)
    }
}

/// Where a swipe ends.
#[derive(Debug, Clone, PartialEq)]
pub enum SwipeEnd {
    To(PositionSpec),
    /// Displacement in pixels
    Vector(i32, i32),
    /// Displacement as a fraction of the screen resolution
    Fraction(f32, f32),
}

impl AutoTap {
    fn after_op(&self) {
        std::thread::sleep(self.settings().op_delay);
    }

    fn device_op<T>(&self, op: impl FnOnce() -> anyhow::Result<T>) -> Result<T> {
        let res = op().map_err(Error::Device)?;
        self.after_op();
        Ok(res)
    }

    /// Resolve `spec`, waiting up to `find_timeout` for a visual target.
    pub fn resolve(&self, spec: &PositionSpec) -> Result<Point> {
        match spec {
            PositionSpec::Literal(pos) => Ok(*pos),
            PositionSpec::Visual(target) => {
                let options = WaitOptions::new(self.settings().find_timeout);
                self.wait(target, &options, None)
            }
        }
    }

    /// Touch `spec` `times` times, `touch_interval` apart.
    pub fn touch(&self, spec: &PositionSpec, times: u32) -> Result<Point> {
        let pos = self.resolve(spec)?;
        debug!("[AutoTap]: touch {pos:?} x{times}");
        self.device_op(|| {
            for i in 0..times {
                if i > 0 {
                    std::thread::sleep(self.settings().touch_interval);
                }
                self.device().touch(pos)?;
            }
            Ok(())
        })?;
        Ok(pos)
    }

    pub fn double_click(&self, spec: &PositionSpec) -> Result<Point> {
        let pos = self.resolve(spec)?;
        debug!("[AutoTap]: double click {pos:?}");
        self.device_op(|| self.device().double_click(pos))?;
        Ok(pos)
    }

    /// Swipe from `from` to `to` over `duration`, returning both resolved points.
    pub fn swipe(
        &self,
        from: &PositionSpec,
        to: &SwipeEnd,
        duration: Duration,
    ) -> Result<(Point, Point)> {
        let start = self.resolve(from)?;
        let end = match to {
            SwipeEnd::To(spec) => self.resolve(spec)?,
            SwipeEnd::Vector(dx, dy) => offset_position(start, (*dx, *dy)),
            SwipeEnd::Fraction(fx, fy) => {
                let (w, h) = self.device().current_resolution().map_err(Error::Device)?;
                let offset = (
                    (fx * w as f32).round() as i32,
                    (fy * h as f32).round() as i32,
                );
                offset_position(start, offset)
            }
        };
        debug!("[AutoTap]: swipe {start:?} -> {end:?} in {duration:?}");
        self.device_op(|| self.device().swipe(start, end, duration))?;
        Ok((start, end))
    }

    pub fn keyevent(&self, name: &str) -> Result<()> {
        self.device_op(|| self.device().keyevent(name))
    }

    pub fn text(&self, text: &str, enter: bool) -> Result<()> {
        self.device_op(|| self.device().text(text, enter))
    }

    pub fn shell(&self, cmd: &str) -> Result<String> {
        self.device_op(|| self.device().shell(cmd))
    }

    pub fn home(&self) -> Result<()> {
        self.device_op(|| self.device().home())
    }

    pub fn wake(&self) -> Result<()> {
        self.device_op(|| self.device().wake())
    }

    pub fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::DynamicImage;

    use crate::{
        layout::ScriptLayout,
        settings::Settings,
        tests::{Call, FakeDevice, ScriptedMatcher, candidate},
    };

    use super::*;

    fn auto_tap(device: Arc<FakeDevice>, matcher: ScriptedMatcher) -> AutoTap {
        AutoTap::new(device, matcher, ScriptLayout::new(".", "test", "1")).with_settings(
            Settings::default()
                .with_op_delay(Duration::ZERO)
                .with_touch_interval(Duration::ZERO)
                .with_find_timeout(Duration::ZERO),
        )
    }

    #[test]
    fn test_touch_literal_and_visual() {
        let device = Arc::new(FakeDevice::new(DynamicImage::new_rgb8(100, 200)));
        let auto_tap = auto_tap(
            device.clone(),
            ScriptedMatcher::new(vec![vec![candidate((40, 50), 0.9)]]),
        );

        assert_eq!(auto_tap.touch(&(1, 2).into(), 2).unwrap(), (1, 2));
        let target = Target::new("start.png");
        assert_eq!(auto_tap.touch(&target.clone().into(), 1).unwrap(), (40, 50));
        assert_eq!(
            device.calls(),
            vec![Call::Touch((1, 2)), Call::Touch((1, 2)), Call::Touch((40, 50))]
        );

        // the visual target is gone now
        assert!(matches!(
            auto_tap.touch(&target.into(), 1),
            Err(Error::TargetNotFound { .. })
        ));
        assert_eq!(device.calls().len(), 3);
    }

    #[test]
    fn test_swipe_ends() {
        let device = Arc::new(FakeDevice::new(DynamicImage::new_rgb8(100, 200)));
        let auto_tap = auto_tap(device.clone(), ScriptedMatcher::new(Vec::new()));
        let duration = Duration::from_millis(300);
        let from = PositionSpec::Literal((10, 20));

        let to = SwipeEnd::To((30, 40).into());
        assert_eq!(auto_tap.swipe(&from, &to, duration).unwrap(), ((10, 20), (30, 40)));
        let vector = SwipeEnd::Vector(5, -5);
        assert_eq!(auto_tap.swipe(&from, &vector, duration).unwrap(), ((10, 20), (15, 15)));
        let fraction = SwipeEnd::Fraction(0.5, 0.25);
        assert_eq!(auto_tap.swipe(&from, &fraction, duration).unwrap(), ((10, 20), (60, 70)));
        assert_eq!(device.calls().len(), 3);
    }

    #[test]
    fn test_key_and_text() {
        let device = Arc::new(FakeDevice::new(DynamicImage::new_rgb8(8, 8)));
        let auto_tap = auto_tap(device.clone(), ScriptedMatcher::new(Vec::new()));

        auto_tap.home().unwrap();
        auto_tap.text("hello world", true).unwrap();
        assert_eq!(auto_tap.shell("ls").unwrap(), "ran ls");
        auto_tap.double_click(&(3, 3).into()).unwrap();
        assert_eq!(
            device.calls(),
            vec![
                Call::Keyevent("HOME".to_string()),
                Call::Text("hello world".to_string(), true),
                Call::Shell("ls".to_string()),
                Call::Touch((3, 3)),
                Call::Touch((3, 3)),
            ]
        );

        device.fail_actions();
        assert!(matches!(auto_tap.wake(), Err(Error::Device(_))));
    }
}
