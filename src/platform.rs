//! Per-platform window layering policy
//!
//! Each platform gets an explicit variant; anything that is not macOS or
//! Windows takes the `Other` rules (which is what the X11 backend runs with).

use crate::config::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

/// Z-order level requested for an always-on-top window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLevel {
    /// Standard always-on-top
    Floating,
    /// Elevated level that can sit above fullscreen applications
    ScreenSaver,
}

/// How reliable the requested layering is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySupport {
    Reliable,
    /// Applied, but known to misbehave on this platform
    Unreliable,
    /// Outcome depends on the compositor/window manager
    CompositorDependent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullscreenPolicy {
    pub always_on_top: bool,
    pub level: WindowLevel,
    pub visible_on_all_workspaces: bool,
    /// Also show on fullscreen spaces/workspaces
    pub visible_on_fullscreen: bool,
    pub support: PolicySupport,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Other
        }
    }

    /// Whether click-through can still forward pointer motion to the window
    pub fn supports_click_forwarding(self) -> bool {
        matches!(self, Self::MacOs | Self::Windows)
    }

    pub fn fullscreen_policy(self, settings: &Settings) -> FullscreenPolicy {
        let above_fullscreen = settings.overlay_above_fullscreen;
        let all_workspaces = settings.visible_on_all_workspaces;

        match self {
            Self::MacOs if above_fullscreen => FullscreenPolicy {
                always_on_top: true,
                level: WindowLevel::ScreenSaver,
                visible_on_all_workspaces: true,
                visible_on_fullscreen: true,
                support: PolicySupport::Reliable,
            },
            Self::MacOs => FullscreenPolicy {
                always_on_top: true,
                level: WindowLevel::Floating,
                visible_on_all_workspaces: all_workspaces,
                visible_on_fullscreen: false,
                support: PolicySupport::Reliable,
            },
            Self::Windows => FullscreenPolicy {
                always_on_top: true,
                level: if above_fullscreen {
                    WindowLevel::ScreenSaver
                } else {
                    WindowLevel::Floating
                },
                visible_on_all_workspaces: all_workspaces,
                visible_on_fullscreen: false,
                support: if above_fullscreen {
                    PolicySupport::Unreliable
                } else {
                    PolicySupport::Reliable
                },
            },
            Self::Other => FullscreenPolicy {
                always_on_top: true,
                level: WindowLevel::Floating,
                visible_on_all_workspaces: all_workspaces,
                visible_on_fullscreen: false,
                support: if above_fullscreen {
                    PolicySupport::CompositorDependent
                } else {
                    PolicySupport::Reliable
                },
            },
        }
    }
}
