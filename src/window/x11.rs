//! X11 overlay surface
//!
//! A 32-bit ARGB window managed by the window manager through EWMH hints.
//! Click-through empties the SHAPE input region; drawing uploads premultiplied
//! BGRA images with `PutImage`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use super::{Surface, SurfaceFactory, WindowEvent, WindowEventSink, WindowOptions};
use crate::animation::sprite::Canvas;
use crate::constants::x11;
use crate::display::FrameSink;
use crate::platform::WindowLevel;
use crate::types::{Bounds, Point, WorkArea};

/// Largest `PutImage` payload sent in one request (stays under the core
/// protocol limit without BIG-REQUESTS)
const MAX_PUT_IMAGE_BYTES: usize = 200 * 1024;

/// Live windows and their destroyed flags, shared with the event thread
type Registry = Arc<Mutex<HashMap<Window, Arc<AtomicBool>>>>;

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub net_wm_desktop: Atom,
    pub net_current_desktop: Atom,
    pub net_workarea: Atom,
    pub net_wm_window_opacity: Atom,
    pub net_active_window: Atom,
    pub motif_wm_hints: Atom,
}

/// Root coordinate saturated into the 16-bit protocol range
fn coord(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}

/// Window extent saturated into the 16-bit protocol range, at least one pixel
fn extent(value: u32) -> u16 {
    u16::try_from(value.max(1)).unwrap_or(u16::MAX)
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {} atom", name))?
        .reply()
        .context(format!("Failed to get reply for {} atom", name))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, "_NET_WM_STATE_ABOVE")?,
            net_wm_state_sticky: intern(conn, "_NET_WM_STATE_STICKY")?,
            net_wm_state_skip_taskbar: intern(conn, "_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern(conn, "_NET_WM_STATE_SKIP_PAGER")?,
            net_wm_desktop: intern(conn, "_NET_WM_DESKTOP")?,
            net_current_desktop: intern(conn, "_NET_CURRENT_DESKTOP")?,
            net_workarea: intern(conn, "_NET_WORKAREA")?,
            net_wm_window_opacity: intern(conn, "_NET_WM_WINDOW_OPACITY")?,
            net_active_window: intern(conn, "_NET_ACTIVE_WINDOW")?,
            motif_wm_hints: intern(conn, "_MOTIF_WM_HINTS")?,
        })
    }
}

pub struct X11Factory {
    conn: Arc<RustConnection>,
    screen: Screen,
    atoms: Arc<CachedAtoms>,
    registry: Registry,
}

impl X11Factory {
    /// Connect to the X server and start forwarding window events to `events`
    pub fn connect(events: WindowEventSink) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 server. Is DISPLAY set correctly?")?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .cloned()
            .context(format!("X11 screen {} not found", screen_num))?;
        info!(screen = screen_num, width = screen.width_in_pixels, height = screen.height_in_pixels, "Connected to X11");

        conn.shape_query_version()
            .context("Failed to query SHAPE extension")?
            .reply()
            .context("SHAPE extension not available; click-through needs it")?;

        let atoms = Arc::new(CachedAtoms::new(&conn).context("Failed to cache X11 atoms at startup")?);
        let conn = Arc::new(conn);
        let registry = Registry::default();

        {
            let conn = conn.clone();
            let registry = registry.clone();
            thread::Builder::new()
                .name("x11-events".to_string())
                .spawn(move || run_event_loop(&conn, &registry, &events))
                .context("Failed to spawn X11 event thread")?;
        }

        Ok(Self {
            conn,
            screen,
            atoms,
            registry,
        })
    }

    fn argb_visual(&self) -> Result<Visualid> {
        self.screen
            .allowed_depths
            .iter()
            .filter(|depth| depth.depth == x11::ARGB_DEPTH)
            .flat_map(|depth| depth.visuals.iter())
            .find(|visual| visual.class == VisualClass::TRUE_COLOR)
            .map(|visual| visual.visual_id)
            .context("No 32-bit ARGB visual found; transparency needs a compositing manager")
    }

    fn setup_window_properties(&self, window: Window) -> Result<()> {
        self.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                x11::WM_CLASS,
            )
            .context("Failed to set WM_CLASS")?;
        self.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_NAME,
                AtomEnum::STRING,
                x11::WM_NAME,
            )
            .context("Failed to set WM_NAME")?;

        // flags, functions, decorations, input mode, status
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.motif_wm_hints,
                self.atoms.motif_wm_hints,
                &[x11::MOTIF_HINTS_DECORATIONS, 0, 0, 0, 0],
            )
            .context("Failed to set _MOTIF_WM_HINTS")?;

        // Initial state; later changes go through client messages
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_state,
                AtomEnum::ATOM,
                &[
                    self.atoms.net_wm_state_above,
                    self.atoms.net_wm_state_skip_taskbar,
                    self.atoms.net_wm_state_skip_pager,
                ],
            )
            .context("Failed to set _NET_WM_STATE")?;

        Ok(())
    }
}

impl SurfaceFactory for X11Factory {
    type Surface = X11Surface;

    fn create(&self, options: &WindowOptions) -> Result<X11Surface> {
        let Bounds { x, y, width, height } = options.bounds;
        let visual = self.argb_visual()?;

        let colormap = self.conn.generate_id().context("Failed to generate X11 colormap ID")?;
        self.conn
            .create_colormap(ColormapAlloc::NONE, colormap, self.screen.root, visual)
            .context("Failed to create ARGB colormap")?;

        let window = self.conn.generate_id().context("Failed to generate X11 window ID")?;
        self.conn
            .create_window(
                x11::ARGB_DEPTH,
                window,
                self.screen.root,
                coord(x),
                coord(y),
                extent(width),
                extent(height),
                0,
                WindowClass::INPUT_OUTPUT,
                visual,
                &CreateWindowAux::new()
                    .background_pixel(0)
                    .border_pixel(0)
                    .colormap(colormap)
                    .event_mask(
                        EventMask::STRUCTURE_NOTIFY
                            | EventMask::BUTTON_PRESS
                            | EventMask::BUTTON_RELEASE
                            | EventMask::POINTER_MOTION,
                    ),
            )
            .context("Failed to create overlay window")?;

        // Destroys the window if we fail during initialization
        struct WindowGuard<'a> {
            conn: &'a RustConnection,
            window: Window,
            colormap: Colormap,
            should_cleanup: bool,
        }

        impl Drop for WindowGuard<'_> {
            fn drop(&mut self) {
                if self.should_cleanup {
                    if let Err(e) = self.conn.destroy_window(self.window) {
                        error!(window = self.window, error = %e, "Failed to cleanup window after initialization failure");
                    }
                    let _ = self.conn.free_colormap(self.colormap);
                    let _ = self.conn.flush();
                }
            }
        }

        let mut guard = WindowGuard {
            conn: &self.conn,
            window,
            colormap,
            should_cleanup: true,
        };

        self.setup_window_properties(window)?;

        self.conn
            .map_window(window)
            .inspect_err(|e| error!(window, error = ?e, "Failed to map overlay window"))
            .context("Failed to map overlay window")?;
        // Window managers may place the window on map; restate the position
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().x(x).y(y))
            .context("Failed to position overlay window")?;
        self.conn.flush().context("Failed to flush X11 connection after window creation")?;
        info!(window, "Mapped overlay window");

        let destroyed = Arc::new(AtomicBool::new(false));
        if let Ok(mut registry) = self.registry.lock() {
            registry.insert(window, destroyed.clone());
        }

        guard.should_cleanup = false;

        Ok(X11Surface {
            conn: self.conn.clone(),
            atoms: self.atoms.clone(),
            root: self.screen.root,
            window,
            colormap,
            destroyed,
            registry: self.registry.clone(),
        })
    }

    fn work_area(&self) -> Result<WorkArea> {
        let workarea = self
            .conn
            .get_property(false, self.screen.root, self.atoms.net_workarea, AtomEnum::CARDINAL, 0, 4)
            .context("Failed to query _NET_WORKAREA")?
            .reply()
            .context("Failed to get reply for _NET_WORKAREA")?;

        if let Some(values) = workarea.value32() {
            let values: Vec<u32> = values.collect();
            if let [_, _, width, height, ..] = values[..]
                && width > 0
                && height > 0
            {
                return Ok(WorkArea::new(width, height));
            }
        }

        debug!("_NET_WORKAREA unavailable, using screen size");
        Ok(WorkArea::new(
            self.screen.width_in_pixels as u32,
            self.screen.height_in_pixels as u32,
        ))
    }
}

pub struct X11Surface {
    conn: Arc<RustConnection>,
    atoms: Arc<CachedAtoms>,
    root: Window,
    window: Window,
    colormap: Colormap,
    destroyed: Arc<AtomicBool>,
    registry: Registry,
}

impl X11Surface {
    /// EWMH client message to the root window about this window
    fn send_root_message(&self, type_: Atom, data: [u32; 5]) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: self.window,
            type_,
            data: ClientMessageData::from(data),
        };
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                event,
            )
            .context(format!("Failed to send client message to root for window {}", self.window))?;
        Ok(())
    }

    fn change_wm_state(&self, add: bool, first: Atom, second: Atom) -> Result<()> {
        let action = if add {
            x11::NET_WM_STATE_ADD
        } else {
            x11::NET_WM_STATE_REMOVE
        };
        self.send_root_message(
            self.atoms.net_wm_state,
            [action, first, second, x11::SOURCE_INDICATION_PAGER, 0],
        )
    }

    fn current_desktop(&self) -> u32 {
        self.conn
            .get_property(false, self.root, self.atoms.net_current_desktop, AtomEnum::CARDINAL, 0, 1)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .and_then(|reply| reply.value32().and_then(|mut values| values.next()))
            .unwrap_or(0)
    }
}

impl Surface for X11Surface {
    fn set_bounds(&mut self, bounds: Bounds) -> Result<()> {
        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .x(i32::from(coord(bounds.x)))
                    .y(i32::from(coord(bounds.y)))
                    .width(u32::from(extent(bounds.width)))
                    .height(u32::from(extent(bounds.height))),
            )
            .context(format!("Failed to configure window {}", self.window))?;
        self.conn.flush().context("Failed to flush X11 connection after reposition")?;
        Ok(())
    }

    fn bounds(&self) -> Result<Bounds> {
        let geom = self
            .conn
            .get_geometry(self.window)
            .context("Failed to send geometry query for overlay window")?
            .reply()
            .context(format!("Failed to get geometry for window {}", self.window))?;
        let origin = self
            .conn
            .translate_coordinates(self.window, self.root, 0, 0)
            .context("Failed to send coordinate translation")?
            .reply()
            .context(format!("Failed to translate coordinates for window {}", self.window))?;
        Ok(Bounds::new(
            origin.dst_x as i32,
            origin.dst_y as i32,
            geom.width as u32,
            geom.height as u32,
        ))
    }

    fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        let value = (opacity.clamp(0.0, 1.0) * x11::OPACITY_OPAQUE as f64).round() as u32;
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                self.atoms.net_wm_window_opacity,
                AtomEnum::CARDINAL,
                &[value],
            )
            .context("Failed to set window opacity")?;
        self.conn.flush().context("Failed to flush X11 connection after opacity change")?;
        Ok(())
    }

    fn set_always_on_top(&mut self, on_top: bool, level: WindowLevel) -> Result<()> {
        if level == WindowLevel::ScreenSaver {
            debug!("X11 has no elevated stacking level, using _NET_WM_STATE_ABOVE");
        }
        self.change_wm_state(on_top, self.atoms.net_wm_state_above, 0)?;
        self.conn.flush().context("Failed to flush X11 connection after state change")?;
        Ok(())
    }

    fn set_ignore_mouse_events(&mut self, ignore: bool, _forward: bool) -> Result<()> {
        if ignore {
            // Empty input region: every click falls through to the window below
            self.conn
                .shape_rectangles(SO::SET, SK::INPUT, ClipOrdering::UNSORTED, self.window, 0, 0, &[])
                .context("Failed to clear input shape")?;
        } else {
            self.conn
                .shape_mask(SO::SET, SK::INPUT, self.window, 0, 0, x11rb::NONE)
                .context("Failed to restore input shape")?;
        }
        self.conn.flush().context("Failed to flush X11 connection after shape change")?;
        debug!(window = self.window, ignore, "Input shape updated");
        Ok(())
    }

    fn set_visible_on_all_workspaces(&mut self, visible: bool, _on_fullscreen: bool) -> Result<()> {
        self.change_wm_state(visible, self.atoms.net_wm_state_sticky, 0)?;
        let desktop = if visible {
            x11::ALL_DESKTOPS
        } else {
            self.current_desktop()
        };
        self.send_root_message(
            self.atoms.net_wm_desktop,
            [desktop, x11::SOURCE_INDICATION_PAGER, 0, 0, 0],
        )?;
        self.conn.flush().context("Failed to flush X11 connection after desktop change")?;
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        self.conn
            .configure_window(self.window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .context(format!("Failed to raise window {} to top of stack", self.window))?;
        self.send_root_message(
            self.atoms.net_active_window,
            [x11::SOURCE_INDICATION_PAGER, x11rb::CURRENT_TIME, 0, 0, 0],
        )?;
        self.conn.flush().context("Failed to flush X11 connection after window activation")?;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut registry) = self.registry.lock() {
            registry.remove(&self.window);
        }
        self.conn
            .destroy_window(self.window)
            .context(format!("Failed to destroy window {}", self.window))?;
        if let Err(e) = self.conn.free_colormap(self.colormap) {
            error!(colormap = self.colormap, error = %e, "Failed to free colormap");
        }
        self.conn.flush().context("Failed to flush X11 connection during cleanup")?;
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn frame_sink(&self) -> Result<Box<dyn FrameSink>> {
        let gc = self.conn.generate_id().context("Failed to generate ID for graphics context")?;
        self.conn
            .create_gc(gc, self.window, &CreateGCAux::new())
            .context("Failed to create graphics context for overlay")?;
        Ok(Box::new(X11FrameSink {
            conn: self.conn.clone(),
            window: self.window,
            gc,
            destroyed: self.destroyed.clone(),
        }))
    }
}

impl Drop for X11Surface {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            error!(window = self.window, error = %e, "Failed to destroy overlay window on drop");
        }
    }
}

/// Draws canvases into an overlay window from the display thread
pub struct X11FrameSink {
    conn: Arc<RustConnection>,
    window: Window,
    gc: Gcontext,
    destroyed: Arc<AtomicBool>,
}

impl FrameSink for X11FrameSink {
    fn present(&mut self, canvas: &Canvas) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) || canvas.width() == 0 || canvas.height() == 0 {
            return Ok(());
        }

        // X11 native ARGB order on little-endian is BGRA
        let data: Vec<u8> = canvas.pixels().iter().flat_map(|pixel| pixel.to_le_bytes()).collect();
        let (Ok(width), Ok(_)) = (u16::try_from(canvas.width()), u16::try_from(canvas.height())) else {
            anyhow::bail!("Frame {}x{} exceeds the X11 image size limit", canvas.width(), canvas.height());
        };
        let stride = canvas.width() as usize * 4;
        let rows_per_request = (MAX_PUT_IMAGE_BYTES / stride).max(1);

        for (index, chunk) in data.chunks(stride * rows_per_request).enumerate() {
            let top = index * rows_per_request;
            self.conn
                .put_image(
                    ImageFormat::Z_PIXMAP,
                    self.window,
                    self.gc,
                    width,
                    extent((chunk.len() / stride) as u32),
                    0,
                    coord(top as i32),
                    0,
                    x11::ARGB_DEPTH,
                    chunk,
                )
                .context(format!("Failed to upload frame to window {}", self.window))?;
        }
        self.conn.flush().context("Failed to flush X11 connection after frame upload")?;
        Ok(())
    }

    fn pointer(&self) -> Result<Option<Point>> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let reply = self
            .conn
            .query_pointer(self.window)
            .context("Failed to send pointer query")?
            .reply()
            .context(format!("Failed to query pointer for window {}", self.window))?;
        Ok(reply
            .same_screen
            .then(|| Point::new(reply.win_x as i32, reply.win_y as i32)))
    }

    fn is_alive(&self) -> bool {
        !self.destroyed.load(Ordering::SeqCst)
    }
}

impl Drop for X11FrameSink {
    fn drop(&mut self) {
        if let Err(e) = self.conn.free_gc(self.gc) {
            error!(gc = self.gc, error = %e, "Failed to free GC");
        }
        let _ = self.conn.flush();
    }
}

fn is_ours(registry: &Registry, window: Window) -> bool {
    registry
        .lock()
        .map(|registry| registry.contains_key(&window))
        .unwrap_or(false)
}

/// Forward pointer and lifecycle events for overlay windows
fn run_event_loop(conn: &RustConnection, registry: &Registry, sink: &WindowEventSink) {
    info!("X11 event thread started");
    loop {
        let event = match conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "X11 connection lost, event thread exiting");
                break;
            }
        };

        match event {
            Event::ButtonPress(event) if is_ours(registry, event.event) => sink(WindowEvent::ButtonPress {
                button: event.detail,
                root: Point::new(event.root_x as i32, event.root_y as i32),
            }),
            Event::ButtonRelease(event) if is_ours(registry, event.event) => sink(WindowEvent::ButtonRelease {
                button: event.detail,
                root: Point::new(event.root_x as i32, event.root_y as i32),
            }),
            Event::MotionNotify(event) if is_ours(registry, event.event) => sink(WindowEvent::Motion {
                root: Point::new(event.root_x as i32, event.root_y as i32),
            }),
            Event::DestroyNotify(event) => {
                // Windows we destroyed ourselves are already unregistered
                let flag = registry
                    .lock()
                    .ok()
                    .and_then(|mut registry| registry.remove(&event.window));
                if let Some(flag) = flag {
                    flag.store(true, Ordering::SeqCst);
                    sink(WindowEvent::Destroyed);
                }
            }
            Event::Error(e) => debug!(error = ?e, "X11 protocol error"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_saturate() {
        assert_eq!(coord(-40), -40);
        assert_eq!(coord(3_000_000), i16::MAX);
        assert_eq!(coord(-3_000_000), i16::MIN);
    }

    #[test]
    fn test_extents_saturate() {
        assert_eq!(extent(0), 1);
        assert_eq!(extent(256), 256);
        assert_eq!(extent(u32::MAX), u16::MAX);
    }
}
