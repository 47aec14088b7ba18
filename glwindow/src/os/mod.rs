//! Platform interface & platform specific code

pub mod context;
pub(crate) mod registry;
pub(crate) mod state;
pub mod window;

#[cfg(target_os = "linux")]
mod x11;

#[cfg(windows)]
mod win32;

use crate::error::Result;
use crate::os::context::GraphicContext;
use crate::os::state::WindowState;
use crate::os::window::{WindowAttributes, WindowPosition, WindowSize};
use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle};
use std::cell::Ref;

/// What every platform backend provides to the [`Window`](window::Window) facade.
///
/// Exactly one implementation is compiled in per target, so the facade holds it by value.
pub(crate) trait WindowBackend: Sized {
    type Context: GraphicContext;

    /// Acquire every native resource or none of them.
    fn create(attributes: &WindowAttributes) -> Result<Self>;

    /// Last state confirmed by the OS (plus the optimistic flags set by requests).
    fn state(&self) -> Ref<'_, WindowState>;

    fn show(&mut self);
    fn hide(&mut self);
    fn focus(&mut self);
    fn process_events(&mut self);

    fn iconify(&mut self);
    fn maximize(&mut self);
    fn switch_to_fullscreen(&mut self);
    fn restore(&mut self);

    fn set_size(&mut self, size: WindowSize);
    fn set_position(&mut self, position: WindowPosition);
    fn set_max_size(&mut self, size: WindowSize);
    fn set_min_size(&mut self, size: WindowSize);
    fn set_resizable(&mut self, resizable: bool);
    fn set_title(&mut self, title: &str);

    fn title(&self) -> String;
    fn context(&self) -> &Self::Context;

    fn raw_window_handle(&self) -> std::result::Result<RawWindowHandle, HandleError>;
    fn raw_display_handle(&self) -> std::result::Result<RawDisplayHandle, HandleError>;
}

#[cfg(target_os = "linux")]
pub(crate) type PlatformWindow = x11::window::X11Window;

#[cfg(windows)]
pub(crate) type PlatformWindow = win32::window::Win32Window;

#[cfg(not(any(target_os = "linux", windows)))]
compile_error!("glwindow supports X11 (Linux) and Win32 (Windows) only");
