use super::context::Win32GraphicContext;
use super::handle::{DeviceContext, NativeWindow};
use super::{
    Application, LOG_TAG, inner_size, outer_position, outer_size, window_rect, window_styles,
};
use crate::error::{Error, Result};
use crate::os::WindowBackend;
use crate::os::state::{FullscreenSlot, RestoreTarget, Snapshot, WindowState};
use crate::os::window::{WindowAttributes, WindowPosition, WindowSize};
use log::{debug, warn};
use raw_window_handle::{
    HandleError, RawDisplayHandle, RawWindowHandle, Win32WindowHandle, WindowsDisplayHandle,
};
use std::cell::{Ref, RefCell};
use std::num::NonZeroIsize;
use std::rc::Rc;
use widestring::U16CString;
use windows::Win32::Foundation::{ERROR_SUCCESS, GetLastError, HWND, SetLastError, WIN32_ERROR};
use windows::Win32::Graphics::Gdi::{
    GetMonitorInfoW, MONITOR_DEFAULTTONEAREST, MONITORINFO, MonitorFromWindow, UpdateWindow,
};
use windows::Win32::UI::Input::KeyboardAndMouse::SetFocus;
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, GWL_EXSTYLE, GWL_STYLE, GetWindowTextLengthW, GetWindowTextW, HWND_TOP,
    SET_WINDOW_POS_FLAGS, SHOW_WINDOW_CMD, SW_HIDE, SW_MAXIMIZE, SW_MINIMIZE, SW_RESTORE, SW_SHOW,
    SetForegroundWindow, SetWindowLongW, SetWindowPos, SetWindowTextW, ShowWindow,
    SWP_FRAMECHANGED, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOOWNERZORDER, SWP_NOSIZE, SWP_NOZORDER,
    WINDOW_EX_STYLE, WINDOW_LONG_PTR_INDEX, WINDOW_STYLE, WS_CAPTION, WS_EX_APPWINDOW,
    WS_EX_CLIENTEDGE, WS_EX_DLGMODALFRAME, WS_EX_OVERLAPPEDWINDOW, WS_EX_STATICEDGE,
    WS_EX_WINDOWEDGE, WS_MAXIMIZEBOX, WS_OVERLAPPEDWINDOW, WS_SIZEBOX, WS_THICKFRAME,
};
use windows::core::PCWSTR;

/// Styles replaced while the window covers its monitor.
#[derive(Copy, Clone, Debug, PartialEq)]
struct FrameStyle {
    style: WINDOW_STYLE,
    ex_style: WINDOW_EX_STYLE,
}

// Fields drop in declaration order: the context goes before the DC it renders to, the DC before
// the window, and the window before the class it was created from.
pub(crate) struct Win32Window {
    context: Win32GraphicContext,
    _device: DeviceContext,
    window: NativeWindow,
    state: Rc<RefCell<WindowState>>,
    saved: FullscreenSlot<FrameStyle>,
    application: Rc<Application>,
}

fn frame_style(resizable: bool) -> FrameStyle {
    let mut style = WS_OVERLAPPEDWINDOW;
    if !resizable {
        style &= !(WS_SIZEBOX | WS_MAXIMIZEBOX);
    }

    FrameStyle {
        style,
        ex_style: WS_EX_OVERLAPPEDWINDOW | WS_EX_APPWINDOW,
    }
}

fn fullscreen_style(frame: FrameStyle) -> FrameStyle {
    FrameStyle {
        style: frame.style & !(WS_CAPTION | WS_THICKFRAME),
        ex_style: frame.ex_style
            & !(WS_EX_DLGMODALFRAME | WS_EX_WINDOWEDGE | WS_EX_CLIENTEDGE | WS_EX_STATICEDGE),
    }
}

fn resizable_style(style: WINDOW_STYLE, resizable: bool) -> WINDOW_STYLE {
    if resizable {
        style | WS_SIZEBOX | WS_MAXIMIZEBOX
    } else {
        style & !(WS_SIZEBOX | WS_MAXIMIZEBOX)
    }
}

/// Frame to put back after fullscreen. The sizing controls follow the current setting, which may
/// have changed since the frame was saved.
fn restored_style(saved: FrameStyle, resizable: bool) -> FrameStyle {
    FrameStyle {
        style: resizable_style(saved.style, resizable),
        ex_style: saved.ex_style,
    }
}

/// `SetWindowLongW` returns the previous value, which may legitimately be zero, so failure is only
/// detectable through the last error.
fn store_window_long(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX, value: u32) -> bool {
    unsafe {
        SetLastError(WIN32_ERROR(0));
        let previous = SetWindowLongW(hwnd, index, value as i32);

        if previous == 0 && GetLastError() != ERROR_SUCCESS {
            warn!(
                target: LOG_TAG,
                "SetWindowLongW({index:?}) failed: {}",
                windows::core::Error::from_win32()
            );
            return false;
        }
    }

    true
}

impl Win32Window {
    fn hwnd(&self) -> HWND {
        self.window.hwnd()
    }

    fn move_frame(&self, x: i32, y: i32, width: i32, height: i32, flags: SET_WINDOW_POS_FLAGS) {
        if let Err(e) = unsafe { SetWindowPos(self.hwnd(), HWND_TOP, x, y, width, height, flags) } {
            warn!(target: LOG_TAG, "SetWindowPos failed: {e}");
        }
    }

    fn apply_frame_style(&self, frame: FrameStyle) -> bool {
        store_window_long(self.hwnd(), GWL_STYLE, frame.style.0)
            && store_window_long(self.hwnd(), GWL_EXSTYLE, frame.ex_style.0)
    }

    fn current_frame_style(&self) -> FrameStyle {
        let (style, ex_style) = window_styles(self.hwnd());
        FrameStyle { style, ex_style }
    }

    fn is_fullscreen(&self) -> bool {
        self.saved.is_active() || self.state.borrow().fullscreen
    }

    fn leave_fullscreen(&mut self) {
        if let Some(snapshot) = self.saved.leave() {
            let resizable = {
                let mut state = self.state.borrow_mut();
                state.fullscreen = false;
                state.resizable
            };

            self.apply_frame_style(restored_style(snapshot.native, resizable));
            self.move_frame(
                snapshot.position.x,
                snapshot.position.y,
                snapshot.size.width as i32,
                snapshot.size.height as i32,
                SWP_NOZORDER | SWP_NOACTIVATE | SWP_FRAMECHANGED,
            );
        }

        self.state.borrow_mut().fullscreen = false;
    }

    fn show_window(&self, command: SHOW_WINDOW_CMD) {
        unsafe {
            // The return value is the previous visibility, not an error.
            _ = ShowWindow(self.hwnd(), command);
        }
    }
}

impl WindowBackend for Win32Window {
    type Context = Win32GraphicContext;

    fn create(attributes: &WindowAttributes) -> Result<Self> {
        let title = U16CString::from_str(&attributes.title)
            .map_err(|e| Error::InvalidTitle(e.nul_position()))?;

        let application = Application::acquire()?;

        let frame = frame_style(attributes.resizable);
        let window = NativeWindow::create(
            &application,
            &title,
            frame.style,
            frame.ex_style,
            outer_size(attributes.size, frame.style, frame.ex_style),
        )?;

        unsafe {
            // The first ShowWindow of a process may take its command from STARTUPINFO instead.
            _ = ShowWindow(window.hwnd(), SW_HIDE);
        }

        let device = DeviceContext::acquire(&window)?;
        device.set_pixel_format(&attributes.context)?;
        let context = Win32GraphicContext::create(&device, &attributes.context)?;

        let state = Rc::new(RefCell::new(WindowState::new(
            inner_size(window.hwnd()),
            outer_position(window.hwnd()),
            attributes.resizable,
        )));
        application.register(window.hwnd(), &state);

        debug!(target: LOG_TAG, "Created window {:?}", window.hwnd());

        Ok(Self {
            context,
            _device: device,
            window,
            state,
            saved: FullscreenSlot::new(),
            application,
        })
    }

    fn state(&self) -> Ref<'_, WindowState> {
        self.state.borrow()
    }

    fn show(&mut self) {
        let iconified = self.state.borrow().iconified;
        self.show_window(if iconified { SW_RESTORE } else { SW_SHOW });

        unsafe {
            _ = UpdateWindow(self.hwnd());
        }

        self.state.borrow_mut().mapped = true;
    }

    fn hide(&mut self) {
        self.show_window(SW_HIDE);
        self.state.borrow_mut().mapped = false;
    }

    fn focus(&mut self) {
        unsafe {
            if let Err(e) = BringWindowToTop(self.hwnd()) {
                warn!(target: LOG_TAG, "BringWindowToTop failed: {e}");
            }

            // Refused when another process owns the foreground, the taskbar flashes instead.
            if !SetForegroundWindow(self.hwnd()).as_bool() {
                debug!(target: LOG_TAG, "SetForegroundWindow refused for {:?}", self.hwnd());
            }

            _ = SetFocus(self.hwnd());
        }
    }

    fn process_events(&mut self) {
        self.application.process_events();
    }

    fn iconify(&mut self) {
        if self.state.borrow().iconified {
            return;
        }

        self.show_window(SW_MINIMIZE);
    }

    fn maximize(&mut self) {
        if self.state.borrow().maximized() {
            return;
        }

        if self.is_fullscreen() {
            self.leave_fullscreen();
        }

        self.show_window(SW_MAXIMIZE);
    }

    fn switch_to_fullscreen(&mut self) {
        if self.is_fullscreen() {
            return;
        }

        if self.state.borrow().maximized {
            // Restoring first keeps the snapshot at the normal frame rectangle.
            self.show_window(SW_RESTORE);
        }

        let frame = self.current_frame_style();
        let rect = window_rect(self.hwnd());
        self.saved.enter(Snapshot {
            position: WindowPosition::new(rect.left, rect.top),
            size: WindowSize::new(
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
            ),
            native: frame,
        });

        self.apply_frame_style(fullscreen_style(frame));
        self.state.borrow_mut().fullscreen = true;

        let mut monitor = MONITORINFO {
            cbSize: size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };

        let found = unsafe {
            GetMonitorInfoW(
                MonitorFromWindow(self.hwnd(), MONITOR_DEFAULTTONEAREST),
                &mut monitor,
            )
        };

        if found.as_bool() {
            let area = monitor.rcMonitor;
            self.move_frame(
                area.left,
                area.top,
                area.right - area.left,
                area.bottom - area.top,
                SWP_NOZORDER | SWP_NOACTIVATE | SWP_FRAMECHANGED,
            );
        } else {
            warn!(target: LOG_TAG, "No monitor found for {:?}", self.hwnd());
        }

        unsafe {
            _ = SetForegroundWindow(self.hwnd());
        }
    }

    fn restore(&mut self) {
        let target = if self.saved.is_active() {
            Some(RestoreTarget::Fullscreen)
        } else {
            self.state.borrow().restore_target()
        };

        match target {
            Some(RestoreTarget::Fullscreen) => self.leave_fullscreen(),
            Some(RestoreTarget::Iconified) | Some(RestoreTarget::Maximized) => {
                self.show_window(SW_RESTORE)
            }
            None => {}
        }
    }

    fn set_size(&mut self, size: WindowSize) {
        let size = self.state.borrow().limits.clamp(size);
        let frame = self.current_frame_style();
        let (width, height) = outer_size(size, frame.style, frame.ex_style);

        self.move_frame(
            0,
            0,
            width,
            height,
            SWP_NOMOVE | SWP_NOOWNERZORDER | SWP_NOZORDER | SWP_NOACTIVATE,
        );
    }

    fn set_position(&mut self, position: WindowPosition) {
        self.move_frame(
            position.x,
            position.y,
            0,
            0,
            SWP_NOSIZE | SWP_NOOWNERZORDER | SWP_NOZORDER | SWP_NOACTIVATE,
        );
    }

    // The limits take effect through WM_GETMINMAXINFO on the next size change.
    fn set_max_size(&mut self, size: WindowSize) {
        self.state.borrow_mut().limits.max = size;
    }

    fn set_min_size(&mut self, size: WindowSize) {
        self.state.borrow_mut().limits.min = size;
    }

    fn set_resizable(&mut self, resizable: bool) {
        // The borderless fullscreen frame has no sizing controls, restore applies the setting.
        if self.saved.is_active() {
            self.state.borrow_mut().resizable = resizable;
            return;
        }

        let style = resizable_style(self.current_frame_style().style, resizable);

        if !store_window_long(self.hwnd(), GWL_STYLE, style.0) {
            return;
        }

        self.state.borrow_mut().resizable = resizable;

        // Cached frame data is only refreshed by SWP_FRAMECHANGED.
        self.move_frame(
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE | SWP_FRAMECHANGED,
        );
    }

    fn set_title(&mut self, title: &str) {
        let title = match U16CString::from_str(title) {
            Ok(title) => title,
            Err(e) => {
                warn!(
                    target: LOG_TAG,
                    "Title contains a nul character at index {}, keeping the current one",
                    e.nul_position()
                );
                return;
            }
        };

        if let Err(e) = unsafe { SetWindowTextW(self.hwnd(), PCWSTR(title.as_ptr())) } {
            warn!(target: LOG_TAG, "SetWindowTextW failed: {e}");
        }
    }

    fn title(&self) -> String {
        unsafe {
            let length = GetWindowTextLengthW(self.hwnd()).max(0) as usize;
            let mut buffer = vec![0u16; length + 1];
            let copied = GetWindowTextW(self.hwnd(), &mut buffer).max(0) as usize;

            String::from_utf16_lossy(&buffer[..copied])
        }
    }

    fn context(&self) -> &Win32GraphicContext {
        &self.context
    }

    fn raw_window_handle(&self) -> std::result::Result<RawWindowHandle, HandleError> {
        let hwnd = NonZeroIsize::new(self.hwnd().0 as isize).ok_or(HandleError::Unavailable)?;

        let mut handle = Win32WindowHandle::new(hwnd);
        handle.hinstance = NonZeroIsize::new(self.application.hinstance.0 as isize);

        Ok(RawWindowHandle::Win32(handle))
    }

    fn raw_display_handle(&self) -> std::result::Result<RawDisplayHandle, HandleError> {
        Ok(RawDisplayHandle::Windows(WindowsDisplayHandle::new()))
    }
}

impl Drop for Win32Window {
    fn drop(&mut self) {
        debug!(target: LOG_TAG, "Destroying window {:?}", self.hwnd());
        // WM_DESTROY from DestroyWindow must not reach a state that is being torn down.
        self.application.unregister(self.hwnd());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_frame_drops_sizing_controls() {
        let fixed = frame_style(false);
        assert!(!fixed.style.contains(WS_SIZEBOX));
        assert!(!fixed.style.contains(WS_MAXIMIZEBOX));
        assert!(fixed.style.contains(WS_CAPTION));

        assert_eq!(resizable_style(fixed.style, true), frame_style(true).style);
    }

    #[test]
    fn fullscreen_frame_has_no_caption_or_border() {
        let frame = fullscreen_style(frame_style(true));
        assert!(!frame.style.contains(WS_CAPTION));
        assert!(!frame.style.contains(WS_THICKFRAME));
        assert!(!frame.ex_style.contains(WS_EX_WINDOWEDGE));
        assert!(frame.ex_style.contains(WS_EX_APPWINDOW));
    }

    #[test]
    fn restored_frame_follows_current_resizable() {
        let saved = frame_style(true);

        let fixed = restored_style(saved, false);
        assert!(!fixed.style.contains(WS_SIZEBOX));
        assert!(!fixed.style.contains(WS_MAXIMIZEBOX));
        assert!(fixed.style.contains(WS_CAPTION));
        assert_eq!(fixed.ex_style, saved.ex_style);

        assert_eq!(restored_style(frame_style(false), true), saved);
    }

    #[test]
    #[ignore = "requires a desktop session"]
    fn resizable_change_during_fullscreen_survives_restore() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut window = Win32Window::create(&WindowAttributes::default())?;
        window.show();
        window.process_events();

        window.switch_to_fullscreen();
        window.set_resizable(false);
        window.process_events();
        assert!(!window.current_frame_style().style.contains(WS_CAPTION));

        window.restore();
        window.process_events();

        let style = window.current_frame_style().style;
        assert!(style.contains(WS_CAPTION));
        assert!(!style.contains(WS_SIZEBOX));
        assert!(!style.contains(WS_MAXIMIZEBOX));
        assert!(!window.state().resizable);

        Ok(())
    }
}
