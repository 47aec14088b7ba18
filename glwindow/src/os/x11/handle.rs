//! Owners for X resources. Each one frees its resource on drop, so a failed construction
//! unwinds whatever was created before it.

use super::X11Server;
use super::context::FramebufferConfig;
use crate::error::{Error, Result};
use crate::os::window::WindowSize;
use std::ffi::{c_long, c_uint, c_void};
use std::mem;
use std::ptr;
use std::rc::Rc;
use x11_dl::xlib;

/// Only what the window state machine consumes. `_NET_WM_STATE` changes arrive as property
/// notifications.
const EVENT_MASK: c_long = xlib::StructureNotifyMask
    | xlib::VisibilityChangeMask
    | xlib::FocusChangeMask
    | xlib::PropertyChangeMask;

const XN_INPUT_STYLE: &[u8] = b"inputStyle\0";
const XN_CLIENT_WINDOW: &[u8] = b"clientWindow\0";
const XN_FOCUS_WINDOW: &[u8] = b"focusWindow\0";

pub(super) struct Colormap {
    server: Rc<X11Server>,
    id: xlib::Colormap,
}

impl Colormap {
    pub(super) fn create(server: &Rc<X11Server>, config: &FramebufferConfig) -> Result<Self> {
        let id = unsafe {
            (server.xlib.XCreateColormap)(
                server.display,
                server.root,
                config.visual,
                xlib::AllocNone,
            )
        };

        if id == 0 {
            return Err(Error::WindowCreation("XCreateColormap failed".to_string()));
        }

        Ok(Self {
            server: server.clone(),
            id,
        })
    }
}

impl Drop for Colormap {
    fn drop(&mut self) {
        unsafe {
            (self.server.xlib.XFreeColormap)(self.server.display, self.id);
        }
    }
}

pub(super) struct NativeWindow {
    server: Rc<X11Server>,
    id: xlib::Window,
}

impl NativeWindow {
    pub(super) fn create(
        server: &Rc<X11Server>,
        colormap: &Colormap,
        config: &FramebufferConfig,
        size: WindowSize,
    ) -> Result<Self> {
        let id = unsafe {
            let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
            attributes.colormap = colormap.id;
            attributes.border_pixel = 0;
            attributes.event_mask = EVENT_MASK;

            (server.xlib.XCreateWindow)(
                server.display,
                server.root,
                0,
                0,
                size.width.max(1),
                size.height.max(1),
                0,
                config.depth,
                xlib::InputOutput as c_uint,
                config.visual,
                xlib::CWColormap | xlib::CWBorderPixel | xlib::CWEventMask,
                &mut attributes,
            )
        };

        if id == 0 {
            return Err(Error::WindowCreation("XCreateWindow failed".to_string()));
        }

        Ok(Self {
            server: server.clone(),
            id,
        })
    }

    pub(super) fn id(&self) -> xlib::Window {
        self.id
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        unsafe {
            (self.server.xlib.XDestroyWindow)(self.server.display, self.id);
        }
        self.server.flush();
    }
}

pub(super) struct InputContext {
    server: Rc<X11Server>,
    ic: xlib::XIC,
}

impl InputContext {
    pub(super) fn create(server: &Rc<X11Server>, window: &NativeWindow) -> Result<Self> {
        let style = (xlib::XIMPreeditNothing | xlib::XIMStatusNothing) as c_long;

        let ic = unsafe {
            (server.xlib.XCreateIC)(
                server.input_method,
                XN_INPUT_STYLE.as_ptr(),
                style,
                XN_CLIENT_WINDOW.as_ptr(),
                window.id,
                XN_FOCUS_WINDOW.as_ptr(),
                window.id,
                ptr::null_mut::<c_void>(),
            )
        };

        if ic.is_null() {
            return Err(Error::InputContext("XCreateIC failed".to_string()));
        }

        Ok(Self {
            server: server.clone(),
            ic,
        })
    }
}

impl Drop for InputContext {
    fn drop(&mut self) {
        unsafe {
            (self.server.xlib.XDestroyIC)(self.ic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_mask_skips_input() {
        let input = xlib::KeyPressMask
            | xlib::KeyReleaseMask
            | xlib::ButtonPressMask
            | xlib::ButtonReleaseMask
            | xlib::PointerMotionMask
            | xlib::ExposureMask;

        assert_eq!(EVENT_MASK & input, 0);
        assert_ne!(EVENT_MASK & xlib::PropertyChangeMask, 0);
        assert_ne!(EVENT_MASK & xlib::VisibilityChangeMask, 0);
    }
}
