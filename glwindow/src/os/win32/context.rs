//! WGL graphic context

use super::handle::DeviceContext;
use crate::error::{Error, Result};
use crate::os::context::{ContextSettings, ContextVersion, GraphicContext, version_attributes};
use log::{debug, error, warn};
use std::mem;
use windows::Win32::Graphics::Gdi::HDC;
use windows::Win32::Graphics::OpenGL::{
    HGLRC, SwapBuffers, wglCreateContext, wglDeleteContext, wglGetCurrentContext,
    wglGetProcAddress, wglMakeCurrent,
};
use windows::core::s;

const LOG_TAG: &str = "wgl_context";

type CreateContextAttribs = unsafe extern "system" fn(HDC, HGLRC, *const i32) -> HGLRC;

pub(crate) struct Win32GraphicContext {
    hdc: HDC,
    hglrc: HGLRC,
}

impl Win32GraphicContext {
    /// The device context must already carry a pixel format.
    pub(super) fn create(device: &DeviceContext, settings: &ContextSettings) -> Result<Self> {
        let hdc = device.hdc();
        let legacy =
            unsafe { wglCreateContext(hdc) }.map_err(|e| Error::ContextCreation(e.to_string()))?;

        let hglrc = match settings.version() {
            Some(version) => unsafe { upgrade(hdc, legacy, version) },
            None => legacy,
        };

        Ok(Self { hdc, hglrc })
    }
}

/// Swap `legacy` for a context of the requested version. `wglCreateContextAttribsARB` only
/// resolves while some context is current, so the legacy one is bound for the lookup. Keeps
/// `legacy` when the driver can't do it.
unsafe fn upgrade(hdc: HDC, legacy: HGLRC, version: ContextVersion) -> HGLRC {
    unsafe {
        if let Err(e) = wglMakeCurrent(hdc, legacy) {
            warn!(target: LOG_TAG, "wglMakeCurrent failed: {e}, using the default context");
            return legacy;
        }

        let versioned = match wglGetProcAddress(s!("wglCreateContextAttribsARB")) {
            Some(address) => {
                let create: CreateContextAttribs = mem::transmute(address);
                let attributes = version_attributes(version);
                create(hdc, HGLRC::default(), attributes.as_ptr())
            }
            None => HGLRC::default(),
        };

        _ = wglMakeCurrent(HDC::default(), HGLRC::default());

        if versioned.is_invalid() {
            warn!(
                target: LOG_TAG,
                "OpenGL {}.{} context unavailable, using the default context",
                version.major,
                version.minor
            );
            return legacy;
        }

        if let Err(e) = wglDeleteContext(legacy) {
            warn!(target: LOG_TAG, "wglDeleteContext failed: {e}");
        }

        debug!(target: LOG_TAG, "Created OpenGL {}.{} context", version.major, version.minor);
        versioned
    }
}

impl GraphicContext for Win32GraphicContext {
    fn valid(&self) -> bool {
        !self.hglrc.is_invalid()
    }

    fn is_current(&self) -> bool {
        self.valid() && unsafe { wglGetCurrentContext() } == self.hglrc
    }

    fn make_current(&self) {
        if self.hdc.is_invalid() || !self.valid() {
            error!(target: LOG_TAG, "make_current called without a device or rendering context");
            debug_assert!(false, "make_current called without a device or rendering context");
            return;
        }

        if let Err(e) = unsafe { wglMakeCurrent(self.hdc, self.hglrc) } {
            warn!(target: LOG_TAG, "wglMakeCurrent failed: {e}");
        }
    }

    fn swap_buffers(&self) {
        if let Err(e) = unsafe { SwapBuffers(self.hdc) } {
            warn!(target: LOG_TAG, "SwapBuffers failed: {e}");
        }
    }
}

impl Drop for Win32GraphicContext {
    fn drop(&mut self) {
        unsafe {
            if self.is_current() {
                _ = wglMakeCurrent(HDC::default(), HGLRC::default());
            }

            if let Err(e) = wglDeleteContext(self.hglrc) {
                warn!(target: LOG_TAG, "wglDeleteContext failed: {e}");
            }
        }
    }
}
