//! Win32 interop

#![cfg(windows)]

mod context;
mod handle;
pub(super) mod window;

use crate::error::{Error, Result};
use crate::os::registry::SharedSlot;
use crate::os::state::{ResizeKind, SizeLimits, WindowEvent, WindowState};
use crate::os::window::{WindowPosition, WindowSize};
use hashbrown::HashMap;
use log::{debug, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use widestring::U16CString;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    AdjustWindowRectEx, CREATESTRUCTW, CS_HREDRAW, CS_OWNDC, CS_VREDRAW, DefWindowProcW,
    DispatchMessageW, GWL_EXSTYLE, GWL_STYLE, GWLP_USERDATA, GetClientRect, GetWindowLongPtrW,
    GetWindowLongW, GetWindowRect, IDC_ARROW, LoadCursorW, MINMAXINFO, MSG, PM_REMOVE,
    PeekMessageW, RegisterClassExW, SIZE_MAXIMIZED, SIZE_MINIMIZED, SWP_HIDEWINDOW,
    SWP_SHOWWINDOW, SetWindowLongPtrW, TranslateMessage, UnregisterClassW, WINDOW_EX_STYLE,
    WINDOW_STYLE, WINDOWPOS, WM_CLOSE, WM_DESTROY, WM_GETMINMAXINFO, WM_KILLFOCUS, WM_MOVE,
    WM_NCCREATE, WM_QUIT, WM_SETFOCUS, WM_SIZE, WM_WINDOWPOSCHANGED, WNDCLASSEXW,
};
use windows::core::PCWSTR;

const LOG_TAG: &str = "win32_window";
const CLASS_NAME: &str = "glwindow_class";

thread_local! {
    static APPLICATION: SharedSlot<Application> = const { SharedSlot::new() };
}

/// Module handle plus the window class every window on this thread is created from.
pub(super) struct Application {
    hinstance: HINSTANCE,
    class_name: U16CString,
    windows: RefCell<HashMap<isize, Weak<RefCell<WindowState>>>>,
}

#[inline]
fn hwnd_key(hwnd: HWND) -> isize {
    hwnd.0 as isize
}

impl Application {
    /// Shared registration, done on first use and undone after the last window is gone.
    pub(super) fn acquire() -> Result<Rc<Application>> {
        APPLICATION.with(|slot| slot.acquire(Application::open))
    }

    fn open() -> Result<Application> {
        let hinstance = HINSTANCE(
            unsafe { GetModuleHandleW(PCWSTR::null()) }
                .map_err(|e| Error::PlatformUnavailable(e.to_string()))?
                .0,
        );

        let class_name = U16CString::from_str_truncate(CLASS_NAME);

        let mut wc = WNDCLASSEXW::default();
        wc.cbSize = size_of::<WNDCLASSEXW>() as u32;
        // A GL window keeps its device context for its whole life.
        wc.style = CS_OWNDC | CS_HREDRAW | CS_VREDRAW;
        wc.lpfnWndProc = Some(window_procedure);
        wc.hInstance = hinstance;
        wc.hCursor = unsafe { LoadCursorW(HINSTANCE::default(), IDC_ARROW) }.unwrap_or_default();
        wc.lpszClassName = PCWSTR(class_name.as_ptr());

        if unsafe { RegisterClassExW(&wc) } == 0 {
            return Err(Error::ClassRegistration(
                windows::core::Error::from_win32().to_string(),
            ));
        }

        debug!(target: LOG_TAG, "Registered window class {CLASS_NAME}");

        Ok(Application {
            hinstance,
            class_name,
            windows: RefCell::new(HashMap::new()),
        })
    }

    pub(super) fn register(&self, hwnd: HWND, state: &Rc<RefCell<WindowState>>) {
        self.windows
            .borrow_mut()
            .insert(hwnd_key(hwnd), Rc::downgrade(state));
    }

    pub(super) fn unregister(&self, hwnd: HWND) {
        self.windows.borrow_mut().remove(&hwnd_key(hwnd));
    }

    /// Drain the thread's message queue. Messages reach [`window_procedure`] through
    /// `DispatchMessageW`.
    pub(super) fn process_events(&self) {
        let mut message = MSG::default();

        unsafe {
            while PeekMessageW(&mut message, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                if message.message == WM_QUIT {
                    debug!(target: LOG_TAG, "Ignoring WM_QUIT, windows are closed by their owners");
                    continue;
                }

                _ = TranslateMessage(&message);
                _ = DispatchMessageW(&message);
            }
        }
    }

    /// Returns `Some` when the message is fully handled, `None` to fall through to
    /// `DefWindowProcW`.
    fn handle_message(
        &self,
        hwnd: HWND,
        message: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> Option<LRESULT> {
        let state = self
            .windows
            .borrow()
            .get(&hwnd_key(hwnd))
            .and_then(Weak::upgrade)?;

        if message == WM_GETMINMAXINFO {
            // Limits set while fullscreen wait for the restore.
            let limits = {
                let state = state.try_borrow().ok()?;
                if state.fullscreen {
                    return None;
                }
                state.limits
            };
            let info = unsafe { (lparam.0 as *mut MINMAXINFO).as_mut() }?;
            write_track_sizes(hwnd, limits, info);
            return Some(LRESULT(0));
        }

        let event = match message {
            WM_CLOSE => WindowEvent::CloseRequested,
            WM_SIZE => WindowEvent::Resized {
                size: client_size(lparam),
                kind: resize_kind(wparam),
            },
            WM_MOVE => WindowEvent::Moved(outer_position(hwnd)),
            WM_WINDOWPOSCHANGED => visibility_change(lparam)?,
            WM_SETFOCUS => WindowEvent::Focus(true),
            WM_KILLFOCUS => WindowEvent::Focus(false),
            WM_DESTROY => WindowEvent::Destroyed,
            _ => return None,
        };

        // Messages sent synchronously from inside a request can arrive while the state is
        // already borrowed.
        match state.try_borrow_mut() {
            Ok(mut state) => state.process(event),
            Err(_) => warn!(target: LOG_TAG, "Dropped {event:?}, window state is busy"),
        }

        match message {
            // The default handling destroys the window.
            WM_CLOSE => Some(LRESULT(0)),
            // WM_WINDOWPOSCHANGED must reach DefWindowProcW, it generates WM_SIZE and WM_MOVE.
            _ => None,
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        debug!(target: LOG_TAG, "Last window gone, unregistering {CLASS_NAME}");

        if let Err(e) = unsafe { UnregisterClassW(PCWSTR(self.class_name.as_ptr()), self.hinstance) }
        {
            warn!(target: LOG_TAG, "UnregisterClassW failed: {e}");
        }
    }
}

unsafe extern "system" fn window_procedure(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        if message == WM_NCCREATE {
            // lpCreateParams carries the Application the window is created from. Every window
            // holds a strong reference to it, so the pointer outlives the HWND.
            if let Some(create) = (lparam.0 as *const CREATESTRUCTW).as_ref() {
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize);
            }
        } else if let Some(application) =
            (GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const Application).as_ref()
        {
            if let Some(result) = application.handle_message(hwnd, message, wparam, lparam) {
                return result;
            }
        }

        DefWindowProcW(hwnd, message, wparam, lparam)
    }
}

fn client_size(lparam: LPARAM) -> WindowSize {
    let packed = lparam.0 as u32;
    WindowSize::new(packed & 0xffff, packed >> 16)
}

fn resize_kind(wparam: WPARAM) -> ResizeKind {
    match wparam.0 as u32 {
        SIZE_MINIMIZED => ResizeKind::Minimized,
        SIZE_MAXIMIZED => ResizeKind::Maximized,
        _ => ResizeKind::Restored,
    }
}

fn visibility_change(lparam: LPARAM) -> Option<WindowEvent> {
    let position = unsafe { (lparam.0 as *const WINDOWPOS).as_ref() }?;

    if position.flags.contains(SWP_SHOWWINDOW) {
        Some(WindowEvent::Mapped)
    } else if position.flags.contains(SWP_HIDEWINDOW) {
        Some(WindowEvent::Unmapped)
    } else {
        None
    }
}

fn write_track_sizes(hwnd: HWND, limits: SizeLimits, info: &mut MINMAXINFO) {
    let (style, ex_style) = window_styles(hwnd);

    if limits.has_min() {
        let (x, y) = outer_size(limits.min, style, ex_style);
        info.ptMinTrackSize = POINT { x, y };
    }

    if limits.has_max() {
        let (x, y) = outer_size(limits.max, style, ex_style);
        info.ptMaxTrackSize = POINT { x, y };
    }
}

pub(super) fn window_styles(hwnd: HWND) -> (WINDOW_STYLE, WINDOW_EX_STYLE) {
    unsafe {
        (
            WINDOW_STYLE(GetWindowLongW(hwnd, GWL_STYLE) as u32),
            WINDOW_EX_STYLE(GetWindowLongW(hwnd, GWL_EXSTYLE) as u32),
        )
    }
}

/// Outer frame size for a client area of `size` under the given styles.
pub(super) fn outer_size(
    size: WindowSize,
    style: WINDOW_STYLE,
    ex_style: WINDOW_EX_STYLE,
) -> (i32, i32) {
    let mut rect = RECT {
        left: 0,
        top: 0,
        right: size.width as i32,
        bottom: size.height as i32,
    };

    if let Err(e) = unsafe { AdjustWindowRectEx(&mut rect, style, false, ex_style) } {
        warn!(target: LOG_TAG, "AdjustWindowRectEx failed: {e}");
    }

    (rect.right - rect.left, rect.bottom - rect.top)
}

pub(super) fn window_rect(hwnd: HWND) -> RECT {
    let mut rect = RECT::default();

    if let Err(e) = unsafe { GetWindowRect(hwnd, &mut rect) } {
        warn!(target: LOG_TAG, "GetWindowRect failed: {e}");
    }

    rect
}

pub(super) fn outer_position(hwnd: HWND) -> WindowPosition {
    let rect = window_rect(hwnd);
    WindowPosition::new(rect.left, rect.top)
}

pub(super) fn inner_size(hwnd: HWND) -> WindowSize {
    let mut rect = RECT::default();

    if let Err(e) = unsafe { GetClientRect(hwnd, &mut rect) } {
        warn!(target: LOG_TAG, "GetClientRect failed: {e}");
    }

    WindowSize::new(
        (rect.right - rect.left).max(0) as u32,
        (rect.bottom - rect.top).max(0) as u32,
    )
}
