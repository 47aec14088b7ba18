//! X11 interop

#![cfg(target_os = "linux")]

mod context;
mod handle;
pub(super) mod window;
mod wm_state;

use crate::error::{Error, Result};
use crate::os::registry::SharedSlot;
use crate::os::state::{WindowEvent, WindowState};
use crate::os::window::{WindowPosition, WindowSize};
use hashbrown::HashMap;
use log::{debug, warn};
use raw_window_handle::{RawDisplayHandle, XlibDisplayHandle};
use std::cell::RefCell;
use std::ffi::{c_int, c_long, c_uchar, c_ulong, c_void};
use std::mem;
use std::ptr::{self, NonNull};
use std::rc::{Rc, Weak};
use std::slice;
use wm_state::Atoms;
use x11_dl::glx::Glx;
use x11_dl::xlib;
use x11_dl::xlib::Xlib;

const LOG_TAG: &str = "x11_window";

thread_local! {
    static SERVER: SharedSlot<X11Server> = const { SharedSlot::new() };
}

/// Connection to the X server, shared by every window on this thread.
pub(super) struct X11Server {
    xlib: Xlib,
    glx: Glx,
    display: *mut xlib::Display,
    screen: c_int,
    root: xlib::Window,
    input_method: xlib::XIM,
    atoms: Atoms,
    windows: RefCell<HashMap<xlib::Window, Weak<RefCell<WindowState>>>>,
}

impl X11Server {
    /// Shared connection, opened on first use and closed after the last window is gone.
    pub(super) fn acquire() -> Result<Rc<X11Server>> {
        SERVER.with(|slot| slot.acquire(X11Server::open))
    }

    fn open() -> Result<X11Server> {
        let xlib = Xlib::open().map_err(|e| Error::PlatformUnavailable(e.to_string()))?;
        let glx = Glx::open().map_err(|e| Error::PlatformUnavailable(e.to_string()))?;

        let display = unsafe { (xlib.XOpenDisplay)(ptr::null()) };
        if display.is_null() {
            return Err(Error::PlatformUnavailable(
                "failed to connect to X server".to_string(),
            ));
        }

        unsafe {
            (xlib.XSetErrorHandler)(Some(log_x_error));
        }

        let input_method = unsafe { open_input_method(&xlib, display) };
        if input_method.is_null() {
            unsafe {
                (xlib.XCloseDisplay)(display);
            }
            return Err(Error::PlatformUnavailable(
                "failed to open X input method".to_string(),
            ));
        }

        let screen = unsafe { (xlib.XDefaultScreen)(display) };
        let root = unsafe { (xlib.XRootWindow)(display, screen) };
        let atoms = unsafe { Atoms::intern(&xlib, display) };

        debug!(target: LOG_TAG, "Connected to X server, screen {screen}");

        Ok(X11Server {
            xlib,
            glx,
            display,
            screen,
            root,
            input_method,
            atoms,
            windows: RefCell::new(HashMap::new()),
        })
    }

    pub(super) fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Xlib(XlibDisplayHandle::new(
            NonNull::new(self.display as *mut c_void),
            self.screen,
        ))
    }

    pub(super) fn register(&self, window: xlib::Window, state: &Rc<RefCell<WindowState>>) {
        self.windows
            .borrow_mut()
            .insert(window, Rc::downgrade(state));
    }

    pub(super) fn unregister(&self, window: xlib::Window) {
        self.windows.borrow_mut().remove(&window);
    }

    pub(super) fn flush(&self) {
        unsafe {
            (self.xlib.XFlush)(self.display);
        }
    }

    /// Wait until the server has processed every request, so the events they cause are queued
    /// before the next drain.
    pub(super) fn sync(&self) {
        unsafe {
            (self.xlib.XSync)(self.display, xlib::False);
        }
    }

    /// Drain every queued event and route it to the window it belongs to.
    pub(super) fn process_events(&self) {
        unsafe {
            while (self.xlib.XPending)(self.display) > 0 {
                let mut event: xlib::XEvent = mem::zeroed();
                (self.xlib.XNextEvent)(self.display, &mut event);

                if (self.xlib.XFilterEvent)(&mut event, 0) != 0 {
                    continue;
                }

                self.dispatch(&event);
            }
        }
    }

    fn dispatch(&self, event: &xlib::XEvent) {
        let window = unsafe { event.any.window };

        let Some(state) = self.windows.borrow().get(&window).and_then(Weak::upgrade) else {
            return;
        };

        if let Some(event) = self.translate(window, event) {
            state.borrow_mut().process(event);
        }
    }

    fn translate(&self, window: xlib::Window, event: &xlib::XEvent) -> Option<WindowEvent> {
        match event.get_type() {
            xlib::ConfigureNotify => {
                let configure = unsafe { event.configure };
                let client = if configure.send_event != 0 {
                    // Synthetic events from the window manager are already in root coordinates.
                    WindowPosition::new(configure.x, configure.y)
                } else {
                    self.root_position(window)
                };

                Some(WindowEvent::Configure {
                    position: self.frame_position(window, client),
                    size: WindowSize::new(configure.width as u32, configure.height as u32),
                })
            }
            xlib::MapNotify => Some(WindowEvent::Mapped),
            xlib::UnmapNotify => Some(WindowEvent::Unmapped),
            xlib::VisibilityNotify => {
                let visibility = unsafe { event.visibility };
                Some(WindowEvent::Visibility {
                    obscured: visibility.state == xlib::VisibilityFullyObscured,
                })
            }
            xlib::FocusIn | xlib::FocusOut => {
                let focus = unsafe { event.focus_change };
                if focus.detail == xlib::NotifyPointer {
                    return None;
                }
                Some(WindowEvent::Focus(event.get_type() == xlib::FocusIn))
            }
            xlib::PropertyNotify => {
                let property = unsafe { event.property };

                if property.atom == self.atoms.net_wm_state {
                    let values = self.read_atom_list(window, self.atoms.net_wm_state);
                    Some(WindowEvent::WmState(self.atoms.decode_wm_state(&values)))
                } else if property.atom == self.atoms.net_frame_extents {
                    // Decorations changed around a client that stayed put.
                    let client = self.root_position(window);
                    Some(WindowEvent::Moved(self.frame_position(window, client)))
                } else {
                    None
                }
            }
            xlib::ClientMessage => {
                let message = unsafe { event.client_message };
                let protocol = message.data.get_long(0) as xlib::Atom;

                (message.message_type == self.atoms.wm_protocols
                    && protocol == self.atoms.wm_delete_window)
                    .then_some(WindowEvent::CloseRequested)
            }
            xlib::DestroyNotify => Some(WindowEvent::Destroyed),
            _ => None,
        }
    }

    /// Window origin in root coordinates. Configure events for reparented windows are relative to
    /// the frame the window manager wrapped them in.
    fn root_position(&self, window: xlib::Window) -> WindowPosition {
        let (mut x, mut y) = (0, 0);
        let mut child: xlib::Window = 0;

        unsafe {
            (self.xlib.XTranslateCoordinates)(
                self.display,
                window,
                self.root,
                0,
                0,
                &mut x,
                &mut y,
                &mut child,
            );
        }

        WindowPosition::new(x, y)
    }

    /// Outer frame origin for a client area at `client`, both in root coordinates.
    fn frame_position(&self, window: xlib::Window, client: WindowPosition) -> WindowPosition {
        let extents = self.read_property(window, self.atoms.net_frame_extents, xlib::XA_CARDINAL);
        let (left, top) = wm_state::frame_offset(&extents);

        WindowPosition::new(client.x - left, client.y - top)
    }

    pub(super) fn read_atom_list(
        &self,
        window: xlib::Window,
        property: xlib::Atom,
    ) -> Vec<xlib::Atom> {
        self.read_property(window, property, xlib::XA_ATOM)
    }

    /// Read a format 32 property of type `kind`. Missing or mistyped properties read as empty.
    fn read_property(
        &self,
        window: xlib::Window,
        property: xlib::Atom,
        kind: xlib::Atom,
    ) -> Vec<c_ulong> {
        let mut actual_type: xlib::Atom = 0;
        let mut actual_format: c_int = 0;
        let mut item_count: c_ulong = 0;
        let mut bytes_after: c_ulong = 0;
        let mut data: *mut c_uchar = ptr::null_mut();

        let status = unsafe {
            (self.xlib.XGetWindowProperty)(
                self.display,
                window,
                property,
                0,
                c_long::MAX,
                xlib::False,
                kind,
                &mut actual_type,
                &mut actual_format,
                &mut item_count,
                &mut bytes_after,
                &mut data,
            )
        };

        if status != xlib::Success as c_int || data.is_null() {
            return Vec::new();
        }

        // Format 32 properties come back as arrays of C longs.
        let values = if actual_type == kind && actual_format == 32 {
            unsafe { slice::from_raw_parts(data as *const c_ulong, item_count as usize) }.to_vec()
        } else {
            Vec::new()
        };

        unsafe {
            (self.xlib.XFree)(data as *mut c_void);
        }

        values
    }

    pub(super) fn write_atom_list(
        &self,
        window: xlib::Window,
        property: xlib::Atom,
        values: &[xlib::Atom],
    ) {
        unsafe {
            (self.xlib.XChangeProperty)(
                self.display,
                window,
                property,
                xlib::XA_ATOM,
                32,
                xlib::PropModeReplace,
                values.as_ptr() as *const c_uchar,
                values.len() as c_int,
            );
        }
    }

    /// Send a client message to the root window, the way EWMH requests reach the window manager.
    pub(super) fn send_to_root(
        &self,
        window: xlib::Window,
        message_type: xlib::Atom,
        data: [c_long; 5],
    ) {
        let mut message = xlib::XClientMessageEvent {
            type_: xlib::ClientMessage,
            serial: 0,
            send_event: xlib::True,
            display: self.display,
            window,
            message_type,
            format: 32,
            data: xlib::ClientMessageData::new(),
        };

        for (index, value) in data.into_iter().enumerate() {
            message.data.set_long(index, value);
        }

        let mut event = xlib::XEvent::from(message);

        let status = unsafe {
            (self.xlib.XSendEvent)(
                self.display,
                self.root,
                xlib::False,
                xlib::SubstructureRedirectMask | xlib::SubstructureNotifyMask,
                &mut event,
            )
        };

        if status == 0 {
            warn!(target: LOG_TAG, "XSendEvent to the root window failed");
        }
    }
}

impl Drop for X11Server {
    fn drop(&mut self) {
        debug!(target: LOG_TAG, "Last window gone, closing X server connection");

        unsafe {
            (self.xlib.XCloseIM)(self.input_method);
            (self.xlib.XCloseDisplay)(self.display);
        }
    }
}

/// Prefer the user's input method and fall back to the built-in one, which always opens.
unsafe fn open_input_method(xlib: &Xlib, display: *mut xlib::Display) -> xlib::XIM {
    unsafe {
        for modifiers in [c"", c"@im=none"] {
            (xlib.XSetLocaleModifiers)(modifiers.as_ptr());

            let input_method =
                (xlib.XOpenIM)(display, ptr::null_mut(), ptr::null_mut(), ptr::null_mut());
            if !input_method.is_null() {
                return input_method;
            }
        }
    }

    ptr::null_mut()
}

/// Asynchronous protocol errors are reported here instead of aborting the process.
unsafe extern "C" fn log_x_error(_: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    if let Some(event) = unsafe { event.as_ref() } {
        warn!(
            target: LOG_TAG,
            "X error {} (request {}.{}, resource {:#x})",
            event.error_code,
            event.request_code,
            event.minor_code,
            event.resourceid
        );
    }

    0
}
