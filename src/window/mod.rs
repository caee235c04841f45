//! Overlay window lifecycle
//!
//! `WindowController` owns at most one overlay surface and applies settings
//! to it. The native window sits behind the `Surface` trait so the controller
//! logic runs the same against X11 and the test mock.

pub mod interaction;
pub mod x11;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{InteractionMode, Settings};
use crate::display::FrameSink;
use crate::geometry::compute_bounds;
use crate::platform::{FullscreenPolicy, Platform, PolicySupport, WindowLevel};
use crate::types::{Bounds, Point, WorkArea};

pub use interaction::{PointerInteraction, PointerOutcome};

/// Creation parameters for an overlay surface
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub bounds: Bounds,
}

/// Native window events forwarded to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    ButtonPress { button: u8, root: Point },
    ButtonRelease { button: u8, root: Point },
    Motion { root: Point },
    Destroyed,
}

/// Receives window events on the backend's event thread
pub type WindowEventSink = Arc<dyn Fn(WindowEvent) + Send + Sync>;

/// Frameless, transparent, always-on-top native window
pub trait Surface {
    fn set_bounds(&mut self, bounds: Bounds) -> Result<()>;
    fn bounds(&self) -> Result<Bounds>;
    fn set_opacity(&mut self, opacity: f64) -> Result<()>;
    fn set_always_on_top(&mut self, on_top: bool, level: WindowLevel) -> Result<()>;
    /// `forward` keeps pointer motion flowing while clicks pass through
    fn set_ignore_mouse_events(&mut self, ignore: bool, forward: bool) -> Result<()>;
    fn set_visible_on_all_workspaces(&mut self, visible: bool, on_fullscreen: bool) -> Result<()>;
    fn focus(&mut self) -> Result<()>;
    fn destroy(&mut self) -> Result<()>;
    fn is_destroyed(&self) -> bool;
    /// Drawing target for the display thread
    fn frame_sink(&self) -> Result<Box<dyn FrameSink>>;
}

pub trait SurfaceFactory {
    type Surface: Surface;

    fn create(&self, options: &WindowOptions) -> Result<Self::Surface>;

    /// Usable area of the primary display
    fn work_area(&self) -> Result<WorkArea>;
}

pub struct WindowController<F: SurfaceFactory> {
    factory: F,
    surface: Option<F::Surface>,
    platform: Platform,
    click_through: bool,
}

impl<F: SurfaceFactory> WindowController<F> {
    pub fn new(factory: F, platform: Platform) -> Self {
        Self {
            factory,
            surface: None,
            platform,
            click_through: false,
        }
    }

    /// Create the overlay, or focus it if one is already live.
    ///
    /// Returns `true` when a new surface was created.
    pub fn create(&mut self, settings: &Settings) -> Result<bool> {
        if let Some(surface) = self.live_mut() {
            debug!("Overlay already exists, focusing");
            surface.focus().context("Failed to focus existing overlay")?;
            return Ok(false);
        }

        let work_area = self.factory.work_area().context("Failed to query work area")?;
        let bounds = compute_bounds(settings, work_area);
        info!(
            x = bounds.x,
            y = bounds.y,
            width = bounds.width,
            height = bounds.height,
            "Creating overlay window"
        );

        let surface = self
            .factory
            .create(&WindowOptions { bounds })
            .context("Failed to create overlay window")?;
        self.surface = Some(surface);

        self.set_opacity(settings.opacity)?;
        self.set_click_through(initial_click_through(settings))?;
        self.apply_fullscreen_policy(settings)?;
        Ok(true)
    }

    /// The live surface, if any
    pub fn get(&self) -> Option<&F::Surface> {
        self.surface.as_ref().filter(|surface| !surface.is_destroyed())
    }

    pub fn is_alive(&self) -> bool {
        self.get().is_some()
    }

    fn live_mut(&mut self) -> Option<&mut F::Surface> {
        self.surface.as_mut().filter(|surface| !surface.is_destroyed())
    }

    pub fn destroy(&mut self) -> Result<()> {
        if let Some(mut surface) = self.surface.take()
            && !surface.is_destroyed()
        {
            info!("Destroying overlay window");
            surface.destroy().context("Failed to destroy overlay window")?;
        }
        Ok(())
    }

    /// Drop a surface that the window system already destroyed
    pub fn forget(&mut self) {
        if self.surface.take().is_some() {
            debug!("Overlay window was destroyed externally");
        }
    }

    /// Recompute bounds from settings and apply them in place
    pub fn reposition(&mut self, settings: &Settings) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        let work_area = self.factory.work_area().context("Failed to query work area")?;
        let bounds = compute_bounds(settings, work_area);
        if let Some(surface) = self.live_mut() {
            debug!(x = bounds.x, y = bounds.y, width = bounds.width, height = bounds.height, "Repositioning overlay");
            surface.set_bounds(bounds).context("Failed to apply overlay bounds")?;
        }
        Ok(())
    }

    pub fn set_click_through(&mut self, enabled: bool) -> Result<()> {
        let forward = self.platform.supports_click_forwarding();
        let Some(surface) = self.live_mut() else {
            return Ok(());
        };
        surface
            .set_ignore_mouse_events(enabled, enabled && forward)
            .context("Failed to change click-through")?;
        self.click_through = enabled;
        Ok(())
    }

    pub fn is_click_through(&self) -> bool {
        self.is_alive() && self.click_through
    }

    pub fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        if let Some(surface) = self.live_mut() {
            surface.set_opacity(opacity).context("Failed to set overlay opacity")?;
        }
        Ok(())
    }

    /// Move the window without resizing it
    pub fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        let Some(surface) = self.live_mut() else {
            return Ok(());
        };
        let current = surface.bounds().context("Failed to read overlay bounds")?;
        surface
            .set_bounds(Bounds::new(x, y, current.width, current.height))
            .context("Failed to move overlay")
    }

    /// Live bounds of the surface
    pub fn bounds(&self) -> Result<Option<Bounds>> {
        self.get().map(|surface| surface.bounds()).transpose()
    }

    /// Layering for the current platform; applied when a window is live
    pub fn apply_fullscreen_policy(&mut self, settings: &Settings) -> Result<FullscreenPolicy> {
        let policy = self.platform.fullscreen_policy(settings);

        match policy.support {
            PolicySupport::Reliable => {}
            PolicySupport::Unreliable => {
                warn!(level = ?policy.level, "Elevated window level may not stay above fullscreen apps on this platform")
            }
            PolicySupport::CompositorDependent => {
                warn!("Staying above fullscreen windows depends on the window manager")
            }
        }

        if let Some(surface) = self.live_mut() {
            surface
                .set_always_on_top(policy.always_on_top, policy.level)
                .context("Failed to set always-on-top")?;
            surface
                .set_visible_on_all_workspaces(policy.visible_on_all_workspaces, policy.visible_on_fullscreen)
                .context("Failed to set workspace visibility")?;
        }
        Ok(policy)
    }

    /// Apply everything that depends on settings to the live window
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        self.reposition(settings)?;
        self.set_opacity(settings.opacity)?;
        self.set_click_through(initial_click_through(settings))?;
        self.apply_fullscreen_policy(settings)?;
        Ok(())
    }

    pub fn frame_sink(&self) -> Result<Option<Box<dyn FrameSink>>> {
        self.get().map(|surface| surface.frame_sink()).transpose()
    }
}

/// Click-through state a window starts in for the given settings.
///
/// Hover-toggle windows start passing clicks and only catch them while the
/// pointer is over the sprite.
fn initial_click_through(settings: &Settings) -> bool {
    match settings.interaction_mode() {
        InteractionMode::ClickThrough | InteractionMode::HoverToggle => true,
        InteractionMode::Solid => false,
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{Call, MockFactory};
    use super::*;
    use crate::config::settings::{PositionMode, Preset};

    fn controller(platform: Platform) -> (WindowController<MockFactory>, mock::CallLog, std::rc::Rc<std::cell::RefCell<bool>>) {
        let factory = MockFactory::new(WorkArea::new(1920, 1080));
        let calls = factory.calls.clone();
        let destroyed = factory.destroyed.clone();
        (WindowController::new(factory, platform), calls, destroyed)
    }

    #[test]
    fn test_create_applies_bounds_and_settings() {
        let (mut windows, calls, _) = controller(Platform::Other);
        assert!(windows.create(&Settings::default()).unwrap());

        assert_eq!(windows.bounds().unwrap(), Some(Bounds::new(896, 932, 128, 128)));
        let calls = MockFactory::take_calls(&calls);
        assert!(calls.contains(&Call::SetOpacity(1.0)));
        assert!(calls.contains(&Call::SetIgnoreMouseEvents(true, false)));
        assert!(calls.contains(&Call::SetAlwaysOnTop(true, WindowLevel::Floating)));
        assert!(calls.contains(&Call::SetVisibleOnAllWorkspaces(true, false)));
    }

    #[test]
    fn test_create_if_absent_focuses_existing() {
        let (mut windows, calls, _) = controller(Platform::Other);
        windows.create(&Settings::default()).unwrap();
        MockFactory::take_calls(&calls);

        assert!(!windows.create(&Settings::default()).unwrap());
        assert_eq!(MockFactory::take_calls(&calls), vec![Call::Focus]);
    }

    #[test]
    fn test_operations_after_destroy_are_noops() {
        let (mut windows, calls, destroyed) = controller(Platform::Other);
        windows.create(&Settings::default()).unwrap();
        // Destroyed behind the controller's back
        *destroyed.borrow_mut() = true;
        MockFactory::take_calls(&calls);

        let settings = Settings::default();
        windows.reposition(&settings).unwrap();
        windows.set_click_through(false).unwrap();
        windows.set_opacity(0.3).unwrap();
        windows.move_to(5, 5).unwrap();
        windows.apply_settings(&settings).unwrap();
        windows.apply_fullscreen_policy(&settings).unwrap();
        windows.destroy().unwrap();

        assert!(MockFactory::take_calls(&calls).is_empty());
        assert!(windows.get().is_none());
        assert_eq!(windows.bounds().unwrap(), None);
    }

    #[test]
    fn test_destroy_then_create_makes_new_surface() {
        let factory = MockFactory::new(WorkArea::new(800, 600));
        let created = factory.created.clone();
        let mut windows = WindowController::new(factory, Platform::Other);

        windows.create(&Settings::default()).unwrap();
        windows.destroy().unwrap();
        assert!(!windows.is_alive());
        windows.create(&Settings::default()).unwrap();
        assert_eq!(*created.borrow(), 2);
    }

    #[test]
    fn test_reposition_follows_settings() {
        let (mut windows, calls, _) = controller(Platform::Other);
        windows.create(&Settings::default()).unwrap();
        MockFactory::take_calls(&calls);

        let mut settings = Settings::default();
        settings.position.preset = Preset::TopRight;
        windows.reposition(&settings).unwrap();
        assert_eq!(
            MockFactory::take_calls(&calls),
            vec![Call::SetBounds(Bounds::new(1772, 20, 128, 128))]
        );

        settings.position.mode = PositionMode::Free;
        settings.position.x = -40;
        settings.position.y = 5000;
        windows.reposition(&settings).unwrap();
        assert_eq!(windows.bounds().unwrap(), Some(Bounds::new(-40, 5000, 128, 128)));
    }

    #[test]
    fn test_click_through_forwarding_by_platform() {
        let (mut windows, calls, _) = controller(Platform::MacOs);
        windows.create(&Settings::default()).unwrap();
        MockFactory::take_calls(&calls);

        windows.set_click_through(true).unwrap();
        windows.set_click_through(false).unwrap();
        assert_eq!(
            MockFactory::take_calls(&calls),
            vec![
                Call::SetIgnoreMouseEvents(true, true),
                Call::SetIgnoreMouseEvents(false, false)
            ]
        );
        assert!(!windows.is_click_through());
    }

    #[test]
    fn test_solid_mode_starts_catching_clicks() {
        let (mut windows, calls, _) = controller(Platform::Other);
        let settings = Settings {
            click_through_enabled: false,
            locked: true,
            ..Settings::default()
        };
        windows.create(&settings).unwrap();
        assert!(MockFactory::take_calls(&calls).contains(&Call::SetIgnoreMouseEvents(false, false)));
        assert!(!windows.is_click_through());
    }

    #[test]
    fn test_move_to_keeps_size() {
        let (mut windows, _, _) = controller(Platform::Other);
        windows.create(&Settings::default()).unwrap();
        windows.move_to(10, 20).unwrap();
        assert_eq!(windows.bounds().unwrap(), Some(Bounds::new(10, 20, 128, 128)));
    }

    #[test]
    fn test_fullscreen_policy_returned_without_window() {
        let (mut windows, calls, _) = controller(Platform::Windows);
        let settings = Settings {
            overlay_above_fullscreen: true,
            ..Settings::default()
        };
        let policy = windows.apply_fullscreen_policy(&settings).unwrap();
        assert_eq!(policy.level, WindowLevel::ScreenSaver);
        assert!(MockFactory::take_calls(&calls).is_empty());
    }
}
