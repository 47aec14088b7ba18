//! Owners for Win32 handles, released on drop in reverse order of creation.

use super::{Application, LOG_TAG};
use crate::error::{Error, Result};
use crate::os::context::{Antialiasing, ContextSettings};
use log::{debug, warn};
use std::ffi::c_void;
use std::rc::Rc;
use widestring::U16CStr;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{GetDC, HDC, ReleaseDC};
use windows::Win32::Graphics::OpenGL::{
    ChoosePixelFormat, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW, PFD_MAIN_PLANE, PFD_SUPPORT_OPENGL,
    PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR, SetPixelFormat,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CW_USEDEFAULT, CreateWindowExW, DestroyWindow, HMENU, WINDOW_EX_STYLE, WINDOW_STYLE,
};
use windows::core::PCWSTR;

pub(super) struct NativeWindow {
    hwnd: HWND,
}

impl NativeWindow {
    pub(super) fn create(
        application: &Rc<Application>,
        title: &U16CStr,
        style: WINDOW_STYLE,
        ex_style: WINDOW_EX_STYLE,
        (width, height): (i32, i32),
    ) -> Result<Self> {
        let hwnd = unsafe {
            CreateWindowExW(
                ex_style,
                PCWSTR(application.class_name.as_ptr()),
                PCWSTR(title.as_ptr()),
                style,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                width,
                height,
                HWND::default(),
                HMENU::default(),
                application.hinstance,
                Some(Rc::as_ptr(application) as *const c_void),
            )
        }
        .map_err(|e| Error::WindowCreation(e.to_string()))?;

        Ok(Self { hwnd })
    }

    pub(super) fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            warn!(target: LOG_TAG, "DestroyWindow failed: {e}");
        }
    }
}

/// The window's own device context (the class is `CS_OWNDC`).
pub(super) struct DeviceContext {
    hwnd: HWND,
    hdc: HDC,
}

impl DeviceContext {
    pub(super) fn acquire(window: &NativeWindow) -> Result<Self> {
        let hdc = unsafe { GetDC(window.hwnd()) };

        if hdc.is_invalid() {
            return Err(Error::WindowCreation(
                "GetDC returned no device context".to_string(),
            ));
        }

        Ok(Self {
            hwnd: window.hwnd(),
            hdc,
        })
    }

    pub(super) fn hdc(&self) -> HDC {
        self.hdc
    }

    /// A pixel format can only be set once per window.
    pub(super) fn set_pixel_format(&self, settings: &ContextSettings) -> Result<()> {
        let descriptor = pixel_format_descriptor(settings);

        if settings.antialiasing() != Antialiasing::None {
            warn!(
                target: LOG_TAG,
                "{:?} antialiasing needs WGL_ARB_pixel_format, using a single sampled format",
                settings.antialiasing()
            );
        }

        let format = unsafe { ChoosePixelFormat(self.hdc, &descriptor) };
        if format == 0 {
            return Err(Error::PixelFormat(
                windows::core::Error::from_win32().to_string(),
            ));
        }

        unsafe { SetPixelFormat(self.hdc, format, &descriptor) }
            .map_err(|e| Error::PixelFormat(e.to_string()))?;

        debug!(target: LOG_TAG, "Using pixel format {format}");

        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
        }
    }
}

fn pixel_format_descriptor(settings: &ContextSettings) -> PIXELFORMATDESCRIPTOR {
    let mut flags = PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL;
    if settings.double_buffer() {
        flags |= PFD_DOUBLEBUFFER;
    }

    PIXELFORMATDESCRIPTOR {
        nSize: size_of::<PIXELFORMATDESCRIPTOR>() as u16,
        nVersion: 1,
        dwFlags: flags,
        iPixelType: PFD_TYPE_RGBA,
        cColorBits: 32,
        cAlphaBits: 8,
        cDepthBits: settings.depth_bits(),
        cStencilBits: settings.stencil_bits(),
        iLayerType: PFD_MAIN_PLANE.0 as u8,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_follows_settings() {
        let descriptor = pixel_format_descriptor(
            &ContextSettings::default()
                .with_depth_bits(16)
                .with_stencil_bits(0)
                .with_double_buffer(false),
        );

        assert_eq!(descriptor.cDepthBits, 16);
        assert_eq!(descriptor.cStencilBits, 0);
        assert!(!descriptor.dwFlags.contains(PFD_DOUBLEBUFFER));
        assert!(descriptor.dwFlags.contains(PFD_SUPPORT_OPENGL));
    }
}
