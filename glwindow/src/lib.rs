//! # glwindow
//!
//! Native top-level windows with an attached OpenGL context, on X11 (Linux) and Win32 (Windows).
//!
//! ```no_run
//! use glwindow::{GraphicContext, Window};
//!
//! let mut window = Window::new((640, 480), "Hello")?;
//! window.show();
//!
//! while window.visible() && !window.close_requested() {
//!     window.process_events();
//!     window.context().make_current();
//!     window.context().swap_buffers();
//! }
//! # Ok::<(), glwindow::Error>(())
//! ```

pub mod error;
pub mod os;

pub use error::{Error, ResourceKind, Result};
pub use os::context::{Antialiasing, ContextSettings, ContextVersion, GraphicContext};
pub use os::window::{Window, WindowAttributes, WindowPosition, WindowSize};

#[cfg(target_os = "linux")]
pub extern crate x11_dl;

#[cfg(windows)]
pub extern crate windows;
