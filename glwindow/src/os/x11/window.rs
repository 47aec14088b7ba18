use super::context::{FramebufferConfig, X11GraphicContext};
use super::handle::{Colormap, InputContext, NativeWindow};
use super::wm_state::{NET_WM_STATE_ADD, NET_WM_STATE_REMOVE, NORMAL_STATE, SOURCE_APPLICATION};
use super::{LOG_TAG, X11Server};
use crate::error::{Error, Result};
use crate::os::WindowBackend;
use crate::os::state::{FullscreenSlot, RestoreTarget, SizeLimits, Snapshot, WindowState};
use crate::os::window::{WindowAttributes, WindowPosition, WindowSize};
use log::{debug, warn};
use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle, XlibWindowHandle};
use std::cell::{Ref, RefCell};
use std::ffi::{CString, c_char, c_int, c_long, c_uchar};
use std::mem;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use x11_dl::xlib;

/// How long to wait for the window manager to answer a state change we depend on.
const WM_PATIENCE: Duration = Duration::from_millis(500);
const WM_POLL: Duration = Duration::from_millis(5);

pub(crate) struct X11Window {
    // Fields drop top to bottom: the context goes first, the server connection last.
    context: X11GraphicContext,
    _input_context: InputContext,
    window: NativeWindow,
    _colormap: Colormap,
    visual_id: xlib::VisualID,
    state: Rc<RefCell<WindowState>>,
    title: String,
    saved: FullscreenSlot<()>,
    server: Rc<X11Server>,
}

impl X11Window {
    fn id(&self) -> xlib::Window {
        self.window.id()
    }

    fn display(&self) -> *mut xlib::Display {
        self.server.display
    }

    fn set_protocols(&self) {
        let mut protocols = [self.server.atoms.wm_delete_window];

        unsafe {
            (self.server.xlib.XSetWMProtocols)(
                self.display(),
                self.id(),
                protocols.as_mut_ptr(),
                protocols.len() as c_int,
            );
        }
    }

    fn set_class_hints(&self, application_name: &str) {
        let Ok(name) = CString::new(application_name) else {
            warn!(target: LOG_TAG, "Application name {application_name:?} contains a nul byte");
            return;
        };

        unsafe {
            let hints = (self.server.xlib.XAllocClassHint)();
            if hints.is_null() {
                warn!(target: LOG_TAG, "XAllocClassHint failed");
                return;
            }

            (*hints).res_name = name.as_ptr() as *mut c_char;
            (*hints).res_class = name.as_ptr() as *mut c_char;
            (self.server.xlib.XSetClassHint)(self.display(), self.id(), hints);
            (self.server.xlib.XFree)(hints as *mut _);
        }
    }

    fn set_wm_hints(&self) {
        unsafe {
            let hints = (self.server.xlib.XAllocWMHints)();
            if hints.is_null() {
                warn!(target: LOG_TAG, "XAllocWMHints failed");
                return;
            }

            (*hints).flags = xlib::InputHint | xlib::StateHint;
            (*hints).input = xlib::True;
            (*hints).initial_state = NORMAL_STATE;
            (self.server.xlib.XSetWMHints)(self.display(), self.id(), hints);
            (self.server.xlib.XFree)(hints as *mut _);
        }
    }

    /// Write `WM_NORMAL_HINTS`. A non-resizable window is pinned to `pinned`.
    fn update_size_hints(&self, resizable: bool, limits: SizeLimits, pinned: WindowSize) {
        unsafe {
            let mut hints: xlib::XSizeHints = mem::zeroed();

            if !resizable {
                hints.flags = xlib::PMinSize | xlib::PMaxSize;
                hints.min_width = pinned.width as c_int;
                hints.min_height = pinned.height as c_int;
                hints.max_width = pinned.width as c_int;
                hints.max_height = pinned.height as c_int;
            } else {
                if limits.has_min() {
                    hints.flags |= xlib::PMinSize;
                    hints.min_width = limits.min.width as c_int;
                    hints.min_height = limits.min.height as c_int;
                }

                if limits.has_max() {
                    hints.flags |= xlib::PMaxSize;
                    hints.max_width = limits.max.width as c_int;
                    hints.max_height = limits.max.height as c_int;
                }
            }

            (self.server.xlib.XSetWMNormalHints)(self.display(), self.id(), &mut hints);
        }
    }

    /// Push the cached size policy to the window manager. Fullscreen keeps the hints lifted,
    /// the policy is written back when it is left.
    fn apply_size_policy(&self) {
        if self.saved.is_active() {
            return;
        }

        let (resizable, limits, size) = {
            let state = self.state.borrow();
            (state.resizable, state.limits, state.size)
        };

        self.update_size_hints(resizable, limits, size);
        self.server.flush();
    }

    /// EWMH state change. Mapped windows ask the window manager, withdrawn ones edit the property
    /// so the manager picks it up when the window gets mapped.
    fn change_wm_state(&self, action: c_long, first: xlib::Atom, second: xlib::Atom) {
        let atoms = self.server.atoms;

        if self.state.borrow().mapped {
            self.server.send_to_root(
                self.id(),
                atoms.net_wm_state,
                [action, first as c_long, second as c_long, SOURCE_APPLICATION, 0],
            );
        } else {
            let current = self.server.read_atom_list(self.id(), atoms.net_wm_state);
            let updated = super::wm_state::edit_state_list(&current, action, &[first, second]);
            self.server
                .write_atom_list(self.id(), atoms.net_wm_state, &updated);
        }

        self.server.flush();
    }

    fn raise_and_focus(&self) {
        unsafe {
            (self.server.xlib.XRaiseWindow)(self.display(), self.id());
        }

        // XSetInputFocus fails on windows that aren't viewable yet, let the WM do it.
        if self.state.borrow().mapped {
            self.server.send_to_root(
                self.id(),
                self.server.atoms.net_active_window,
                [SOURCE_APPLICATION, xlib::CurrentTime as c_long, 0, 0, 0],
            );
        }

        self.server.flush();
    }

    fn is_fullscreen(&self) -> bool {
        self.saved.is_active() || self.state.borrow().fullscreen
    }

    /// Notice a fullscreen switch the window manager undid on its own (a keyboard shortcut, a
    /// workspace change) and drop the snapshot so the next switch takes a fresh one.
    fn sync_fullscreen(&mut self) {
        let reported = self.state.borrow().wm_fullscreen;

        if self.saved.observe(reported).is_some() {
            debug!(target: LOG_TAG, "Window {:#x} left fullscreen externally", self.id());
            self.state.borrow_mut().fullscreen = false;
            self.apply_size_policy();
        }
    }

    /// Pump events until `pending` no longer holds or the window manager ran out of time.
    /// Returns whether the condition was met.
    fn process_events_while(&mut self, pending: impl Fn(&WindowState) -> bool) -> bool {
        let started = Instant::now();

        loop {
            self.server.sync();
            self.process_events();

            if !pending(&self.state.borrow()) {
                return true;
            }

            if started.elapsed() > WM_PATIENCE {
                return false;
            }

            thread::sleep(WM_POLL);
        }
    }

    fn leave_fullscreen(&mut self) {
        let atoms = self.server.atoms;
        self.change_wm_state(NET_WM_STATE_REMOVE, atoms.net_wm_state_fullscreen, 0);

        if let Some(snapshot) = self.saved.leave() {
            // Settings changed while fullscreen live in the cached state.
            let (resizable, limits) = {
                let state = self.state.borrow();
                (state.resizable, state.limits)
            };
            self.update_size_hints(resizable, limits, snapshot.size);

            unsafe {
                (self.server.xlib.XMoveResizeWindow)(
                    self.display(),
                    self.id(),
                    snapshot.position.x,
                    snapshot.position.y,
                    snapshot.size.width.max(1),
                    snapshot.size.height.max(1),
                );
            }
        }

        {
            let mut state = self.state.borrow_mut();
            state.fullscreen = false;
            state.wm_fullscreen = false;
        }
        self.server.flush();
    }

    fn store_title(&mut self, title: &str) {
        let Ok(name) = CString::new(title) else {
            warn!(target: LOG_TAG, "Title {title:?} contains a nul byte, keeping {:?}", self.title);
            return;
        };

        unsafe {
            (self.server.xlib.XStoreName)(self.display(), self.id(), name.as_ptr() as *mut c_char);
            (self.server.xlib.XChangeProperty)(
                self.display(),
                self.id(),
                self.server.atoms.net_wm_name,
                self.server.atoms.utf8_string,
                8,
                xlib::PropModeReplace,
                title.as_ptr() as *const c_uchar,
                title.len() as c_int,
            );
        }

        self.title = title.to_string();
        self.server.flush();
    }
}

impl WindowBackend for X11Window {
    type Context = X11GraphicContext;

    fn create(attributes: &WindowAttributes) -> Result<Self> {
        CString::new(attributes.title.as_str())
            .map_err(|e| Error::InvalidTitle(e.nul_position()))?;

        let server = X11Server::acquire()?;

        let config = FramebufferConfig::choose(&server, &attributes.context)?;
        let colormap = Colormap::create(&server, &config)?;
        let window = NativeWindow::create(&server, &colormap, &config, attributes.size)?;
        let input_context = InputContext::create(&server, &window)?;
        let context = X11GraphicContext::create(&server, &config, &window, &attributes.context)?;

        let state = Rc::new(RefCell::new(WindowState::new(
            attributes.size,
            WindowPosition::default(),
            attributes.resizable,
        )));
        server.register(window.id(), &state);

        let mut this = Self {
            context,
            _input_context: input_context,
            window,
            _colormap: colormap,
            visual_id: config.visual_id,
            state,
            title: String::new(),
            saved: FullscreenSlot::new(),
            server,
        };

        this.set_protocols();
        this.set_class_hints(&attributes.application_name);
        this.set_wm_hints();
        this.apply_size_policy();
        this.store_title(&attributes.title);

        debug!(target: LOG_TAG, "Created window {:#x}", this.id());

        Ok(this)
    }

    fn state(&self) -> Ref<'_, WindowState> {
        self.state.borrow()
    }

    fn show(&mut self) {
        let iconified = self.state.borrow().iconified;

        unsafe {
            // Mapping an iconic window returns it to the normal state.
            (self.server.xlib.XMapWindow)(self.display(), self.id());
        }

        self.state.borrow_mut().mapped = true;

        if iconified {
            self.raise_and_focus();
        }

        self.server.sync();
    }

    fn hide(&mut self) {
        unsafe {
            (self.server.xlib.XUnmapWindow)(self.display(), self.id());
        }

        self.state.borrow_mut().mapped = false;
        self.server.sync();
    }

    fn focus(&mut self) {
        self.raise_and_focus();
    }

    fn process_events(&mut self) {
        self.server.process_events();
        self.sync_fullscreen();
    }

    fn iconify(&mut self) {
        if self.state.borrow().iconified {
            return;
        }

        let status = unsafe {
            (self.server.xlib.XIconifyWindow)(self.display(), self.id(), self.server.screen)
        };

        if status == 0 {
            warn!(target: LOG_TAG, "XIconifyWindow failed for window {:#x}", self.id());
        }

        self.server.flush();
    }

    fn maximize(&mut self) {
        self.sync_fullscreen();

        if self.state.borrow().maximized() {
            return;
        }

        if self.is_fullscreen() {
            self.leave_fullscreen();
        }

        let (vert, horz) = self.server.atoms.maximized_pair();
        self.change_wm_state(NET_WM_STATE_ADD, vert, horz);
    }

    fn switch_to_fullscreen(&mut self) {
        self.sync_fullscreen();

        if self.is_fullscreen() {
            return;
        }

        if self.state.borrow().maximized {
            // Unmaximize first so the snapshot holds the normal geometry, not the work area.
            let (vert, horz) = self.server.atoms.maximized_pair();
            self.change_wm_state(NET_WM_STATE_REMOVE, vert, horz);

            if !self.process_events_while(|state| state.maximized) {
                warn!(
                    target: LOG_TAG,
                    "Window {:#x} still maximized, fullscreen will restore to the work area",
                    self.id()
                );
            }
        }

        let snapshot = {
            let state = self.state.borrow();
            Snapshot {
                position: state.position,
                size: state.size,
                native: (),
            }
        };
        self.saved.enter(snapshot);

        // Size hints would keep the window manager from covering the monitor.
        self.update_size_hints(true, SizeLimits::default(), WindowSize::default());
        self.change_wm_state(
            NET_WM_STATE_ADD,
            self.server.atoms.net_wm_state_fullscreen,
            0,
        );
        self.state.borrow_mut().fullscreen = true;

        self.raise_and_focus();
    }

    fn restore(&mut self) {
        self.sync_fullscreen();

        let target = if self.saved.is_active() {
            Some(RestoreTarget::Fullscreen)
        } else {
            self.state.borrow().restore_target()
        };

        match target {
            Some(RestoreTarget::Fullscreen) => self.leave_fullscreen(),
            Some(RestoreTarget::Iconified) => self.show(),
            Some(RestoreTarget::Maximized) => {
                let (vert, horz) = self.server.atoms.maximized_pair();
                self.change_wm_state(NET_WM_STATE_REMOVE, vert, horz);
            }
            None => {}
        }
    }

    fn set_size(&mut self, size: WindowSize) {
        let (resizable, limits) = {
            let state = self.state.borrow();
            (state.resizable, state.limits)
        };
        let size = limits.clamp(size);

        // Fullscreen hints stay lifted, the pin is rewritten on restore.
        if !resizable && !self.saved.is_active() {
            // Move the pin first, otherwise the window manager rejects the resize.
            self.update_size_hints(false, limits, size);
        }

        unsafe {
            (self.server.xlib.XResizeWindow)(
                self.display(),
                self.id(),
                size.width.max(1),
                size.height.max(1),
            );
        }

        self.server.flush();
    }

    fn set_position(&mut self, position: WindowPosition) {
        unsafe {
            (self.server.xlib.XMoveWindow)(self.display(), self.id(), position.x, position.y);
        }

        self.server.flush();
    }

    fn set_max_size(&mut self, size: WindowSize) {
        self.state.borrow_mut().limits.max = size;
        self.apply_size_policy();
    }

    fn set_min_size(&mut self, size: WindowSize) {
        self.state.borrow_mut().limits.min = size;
        self.apply_size_policy();
    }

    fn set_resizable(&mut self, resizable: bool) {
        self.state.borrow_mut().resizable = resizable;
        self.apply_size_policy();
    }

    fn set_title(&mut self, title: &str) {
        self.store_title(title);
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn context(&self) -> &X11GraphicContext {
        &self.context
    }

    fn raw_window_handle(&self) -> std::result::Result<RawWindowHandle, HandleError> {
        let mut handle = XlibWindowHandle::new(self.id());
        handle.visual_id = self.visual_id;

        Ok(RawWindowHandle::Xlib(handle))
    }

    fn raw_display_handle(&self) -> std::result::Result<RawDisplayHandle, HandleError> {
        Ok(self.server.raw_display_handle())
    }
}

impl Drop for X11Window {
    fn drop(&mut self) {
        debug!(target: LOG_TAG, "Destroying window {:#x}", self.id());
        self.server.unregister(self.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_hints(window: &X11Window) -> xlib::XSizeHints {
        unsafe {
            let mut hints: xlib::XSizeHints = mem::zeroed();
            let mut supplied: c_long = 0;
            (window.server.xlib.XGetWMNormalHints)(
                window.display(),
                window.id(),
                &mut hints,
                &mut supplied,
            );
            hints
        }
    }

    fn shown(title: &str) -> Result<X11Window> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut window = X11Window::create(&WindowAttributes {
            title: title.to_string(),
            ..Default::default()
        })?;
        window.show();
        window.process_events_while(|state| !state.visible());

        Ok(window)
    }

    #[test]
    #[ignore = "requires a display server"]
    fn size_policy_set_while_fullscreen_applies_on_restore() -> anyhow::Result<()> {
        let mut window = shown("Policy")?;
        let size = window.state().size;

        window.switch_to_fullscreen();
        window.set_resizable(false);
        window.set_min_size(WindowSize::new(200, 150));

        // Still lifted, otherwise the window manager could not cover the monitor.
        let lifted = size_hints(&window);
        assert_eq!(lifted.flags & (xlib::PMinSize | xlib::PMaxSize), 0);

        window.restore();
        window.server.sync();

        let pinned = size_hints(&window);
        assert_ne!(pinned.flags & xlib::PMinSize, 0);
        assert_ne!(pinned.flags & xlib::PMaxSize, 0);
        assert_eq!(pinned.min_width, pinned.max_width);
        assert_eq!(pinned.min_height, pinned.max_height);
        assert_eq!(pinned.min_width, size.width as c_int);
        assert!(!window.state().resizable);

        Ok(())
    }

    #[test]
    #[ignore = "requires a display server"]
    fn fullscreen_left_by_window_manager() -> anyhow::Result<()> {
        let mut window = shown("External")?;

        window.switch_to_fullscreen();
        assert!(window.process_events_while(|state| !state.wm_fullscreen));

        // What a window manager shortcut does.
        let fullscreen = window.server.atoms.net_wm_state_fullscreen;
        window.change_wm_state(NET_WM_STATE_REMOVE, fullscreen, 0);
        assert!(window.process_events_while(|state| state.wm_fullscreen));

        assert!(!window.saved.is_active());
        assert!(!window.state().fullscreen);

        window.switch_to_fullscreen();
        assert!(window.saved.is_active());
        assert!(window.state().fullscreen);

        Ok(())
    }
}
