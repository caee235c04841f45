//! Application-wide constants
//!
//! Magic numbers and string literals used throughout the application,
//! grouped by the subsystem that consumes them.

/// X11 protocol constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// `_NET_WM_DESKTOP` value meaning "all desktops"
    pub const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

    /// `_NET_WM_STATE` client message actions
    pub const NET_WM_STATE_REMOVE: u32 = 0;
    pub const NET_WM_STATE_ADD: u32 = 1;

    /// Source indication for EWMH client messages (2 = pager/direct user action)
    pub const SOURCE_INDICATION_PAGER: u32 = 2;

    /// `_MOTIF_WM_HINTS` flag announcing the decorations field
    pub const MOTIF_HINTS_DECORATIONS: u32 = 1 << 1;

    /// Fully opaque value for `_NET_WM_WINDOW_OPACITY`
    pub const OPACITY_OPAQUE: u32 = 0xFFFF_FFFF;

    /// WM_CLASS instance and class, NUL separated
    pub const WM_CLASS: &[u8] = b"keypet\0keypet\0";

    /// Window title shown by pagers that ignore skip hints
    pub const WM_NAME: &[u8] = b"keypet";
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Key release event value
    pub const KEY_RELEASE: i32 = 0;
}

/// Mouse button constants (X11 core protocol numbering)
pub mod mouse {
    /// Left mouse button number
    pub const BUTTON_LEFT: u8 = 1;

    /// Right mouse button number
    pub const BUTTON_RIGHT: u8 = 3;
}

/// Filesystem locations
pub mod paths {
    /// Directory holding evdev device nodes
    pub const DEV_INPUT: &str = "/dev/input";

    /// Application directory under config/data/runtime dirs
    pub const APP_DIR: &str = "keypet";

    /// Settings file name
    pub const SETTINGS_FILE: &str = "settings.json";

    /// IPC socket file name
    pub const SOCKET_FILE: &str = "control.sock";

    /// Custom sprite directory (under the data dir)
    pub const CUSTOM_DIR: &str = "custom";

    /// Installed character packs (under the data dir)
    pub const PACKS_DIR: &str = "packs";

    /// Manifest file inside a character pack directory
    pub const PACK_MANIFEST: &str = "pack.json";
}

/// Permission hints printed when input devices are unreadable
pub mod permissions {
    /// Group granting read access to /dev/input on most distributions
    pub const INPUT_GROUP: &str = "input";

    /// Command to add the current user to the input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}

/// Animation playback constants
pub mod animation {
    /// Display loop tick interval (~60 Hz)
    pub const FRAME_INTERVAL_MS: u64 = 16;

    /// Well-known state names
    pub const IDLE: &str = "idle";
    pub const LEFT: &str = "left";
    pub const RIGHT: &str = "right";
    pub const BOTH: &str = "both";
    pub const HIT: &str = "hit";
}

/// Settings schema limits
pub mod limits {
    /// Allowed window scale range
    pub const SCALE_MIN: f64 = 0.5;
    pub const SCALE_MAX: f64 = 2.0;

    /// Animation playback rate range (frames per second)
    pub const FPS_MIN: f64 = 1.0;
    pub const FPS_MAX: f64 = 120.0;

    /// Base window size range in pixels, before scaling
    pub const WINDOW_SIZE_MIN: u32 = 1;
    pub const WINDOW_SIZE_MAX: u32 = 4096;

    pub const PADDING_MAX: u32 = 4096;
}

/// IPC framing constants
pub mod ipc {
    /// Maximum message size (10 MB) to prevent memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// How long the settings window waits for a reply
    pub const REPLY_TIMEOUT_MS: u64 = 2000;

    /// Frames queued per client before pushes to it start failing
    pub const OUTBOX_CAPACITY: usize = 256;

    /// A client that accepts no data for this long is disconnected
    pub const WRITE_TIMEOUT_MS: u64 = 1000;
}
