//! Platform generic windows

use crate::error::Result;
use crate::os::context::{ContextSettings, GraphicContext};
use crate::os::{PlatformWindow, WindowBackend};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use serde::{Deserialize, Serialize};

/// Client area size in physical pixels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `(0, 0)` is used as "unset" for size limits.
    pub fn is_zero(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

impl From<(u32, u32)> for WindowSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Position of the window's outer frame on the desktop.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

impl WindowPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Set of attributes that control how a window is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowAttributes {
    /// Initial client size (defaults to 640x480)
    pub size: WindowSize,

    /// Window title (defaults to `"Window"`)
    pub title: String,

    /// Application name reported to the window manager (`WM_CLASS` on X11, ignored on Windows)
    pub application_name: String,

    /// Is the window resizable?
    pub resizable: bool, // = true

    /// Framebuffer requirements for the attached context
    pub context: ContextSettings,
}

impl Default for WindowAttributes {
    fn default() -> Self {
        Self {
            size: WindowSize::new(640, 480),
            title: "Window".to_string(),
            application_name: "glwindow".to_string(),
            resizable: true,
            context: ContextSettings::default(),
        }
    }
}

/// A native window with an attached OpenGL context.
///
/// All geometry and state getters return cached values. Setters only *request* a change from the
/// OS; [`size`](Window::size) and [`position`](Window::position) change once the OS confirms the
/// new geometry, which is picked up by [`process_events`](Window::process_events).
///
/// Windows must stay on the thread that created them.
pub struct Window {
    backend: PlatformWindow,
}

impl Window {
    pub fn new(size: impl Into<WindowSize>, title: &str) -> Result<Self> {
        Self::with_attributes(WindowAttributes {
            size: size.into(),
            title: title.to_string(),
            ..Default::default()
        })
    }

    pub fn with_attributes(attributes: WindowAttributes) -> Result<Self> {
        Ok(Self {
            backend: PlatformWindow::create(&attributes)?,
        })
    }

    /// Map the window. An iconified window is restored instead.
    pub fn show(&mut self) {
        self.backend.show();
    }

    pub fn hide(&mut self) {
        self.backend.hide();
    }

    pub fn focus(&mut self) {
        self.backend.focus();
    }

    /// Drain the events the OS has queued so far. Never waits for new ones.
    pub fn process_events(&mut self) {
        self.backend.process_events();
    }

    pub fn iconify(&mut self) {
        self.backend.iconify();
    }

    pub fn maximize(&mut self) {
        self.backend.maximize();
    }

    pub fn switch_to_fullscreen(&mut self) {
        self.backend.switch_to_fullscreen();
    }

    /// Undo fullscreen, iconified or maximized, whichever is active first in that order.
    pub fn restore(&mut self) {
        self.backend.restore();
    }

    /// Request a new client size. Clamped to the current min/max size.
    pub fn set_size(&mut self, size: impl Into<WindowSize>) {
        self.backend.set_size(size.into());
    }

    pub fn set_position(&mut self, position: WindowPosition) {
        self.backend.set_position(position);
    }

    /// `(0, 0)` removes the limit.
    pub fn set_max_size(&mut self, size: impl Into<WindowSize>) {
        self.backend.set_max_size(size.into());
    }

    /// `(0, 0)` removes the limit.
    pub fn set_min_size(&mut self, size: impl Into<WindowSize>) {
        self.backend.set_min_size(size.into());
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.backend.set_resizable(resizable);
    }

    pub fn set_title(&mut self, title: &str) {
        self.backend.set_title(title);
    }

    pub fn position(&self) -> WindowPosition {
        self.backend.state().position
    }

    pub fn size(&self) -> WindowSize {
        self.backend.state().size
    }

    pub fn max_size(&self) -> WindowSize {
        self.backend.state().limits.max
    }

    pub fn min_size(&self) -> WindowSize {
        self.backend.state().limits.min
    }

    pub fn title(&self) -> String {
        self.backend.title()
    }

    pub fn fullscreen(&self) -> bool {
        self.backend.state().fullscreen
    }

    pub fn iconified(&self) -> bool {
        self.backend.state().iconified
    }

    pub fn maximized(&self) -> bool {
        self.backend.state().maximized()
    }

    pub fn resizable(&self) -> bool {
        self.backend.state().resizable
    }

    pub fn visible(&self) -> bool {
        self.backend.state().visible()
    }

    /// The window is mapped but fully covered by other windows. Only X11 reports this, on
    /// Windows it is always `false`. An obscured window still counts as [`visible`](Self::visible).
    pub fn obscured(&self) -> bool {
        self.backend.state().obscured
    }

    pub fn focused(&self) -> bool {
        self.backend.state().focused
    }

    /// The user asked the window manager to close the window. The window stays alive until it is
    /// dropped.
    pub fn close_requested(&self) -> bool {
        self.backend.state().close_requested
    }

    pub fn context(&self) -> &impl GraphicContext {
        self.backend.context()
    }
}

impl HasWindowHandle for Window {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        let raw = self.backend.raw_window_handle()?;

        // SAFETY: the native window lives as long as `self`.
        unsafe { Ok(WindowHandle::borrow_raw(raw)) }
    }
}

impl HasDisplayHandle for Window {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        let raw = self.backend.raw_display_handle()?;

        // SAFETY: the backend keeps the shared connection alive.
        unsafe { Ok(DisplayHandle::borrow_raw(raw)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_default() {
        let attributes = WindowAttributes::default();

        assert_eq!(attributes.size, WindowSize::new(640, 480));
        assert_eq!(attributes.title, "Window");
        assert!(attributes.resizable);
    }

    #[test]
    fn attributes_from_toml() {
        let attributes: WindowAttributes = toml::from_str(
            r#"
            title = "Test"
            resizable = false

            [size]
            width = 1280
            height = 720

            [context]
            depth_bits = 32
            "#,
        )
        .unwrap();

        assert_eq!(attributes.title, "Test");
        assert_eq!(attributes.size, WindowSize::new(1280, 720));
        assert!(!attributes.resizable);
        assert_eq!(attributes.context.depth_bits(), 32);
        assert_eq!(attributes.application_name, "glwindow");
    }

    #[test]
    fn zero_size_means_unset() {
        assert!(WindowSize::default().is_zero());
        assert!(!WindowSize::new(0, 1).is_zero());
        assert_eq!(WindowSize::from((3, 4)), WindowSize::new(3, 4));
    }
}
