//! GLX graphic context

use super::X11Server;
use super::handle::NativeWindow;
use crate::error::{Error, Result};
use crate::os::context::{ContextSettings, ContextVersion, GraphicContext, version_attributes};
use log::{debug, error, warn};
use std::ffi::{c_int, c_uchar, c_void};
use std::{mem, ptr};
use std::rc::Rc;
use x11_dl::glx;
use x11_dl::xlib;

const LOG_TAG: &str = "glx_context";

type CreateContextAttribs = unsafe extern "C" fn(
    *mut xlib::Display,
    glx::GLXFBConfig,
    glx::GLXContext,
    xlib::Bool,
    *const c_int,
) -> glx::GLXContext;

/// Framebuffer configuration picked for a window, with the X visual it maps to.
pub(super) struct FramebufferConfig {
    pub config: glx::GLXFBConfig,
    pub visual: *mut xlib::Visual,
    pub visual_id: xlib::VisualID,
    pub depth: c_int,
}

impl FramebufferConfig {
    pub(super) fn choose(server: &X11Server, settings: &ContextSettings) -> Result<Self> {
        let attributes = framebuffer_attributes(settings);

        let mut count: c_int = 0;
        let configs = unsafe {
            (server.glx.glXChooseFBConfig)(
                server.display,
                server.screen,
                attributes.as_ptr(),
                &mut count,
            )
        };

        if configs.is_null() || count <= 0 {
            return Err(Error::PixelFormat(format!(
                "no framebuffer configuration matches {settings:?}"
            )));
        }

        // GLX sorts the matches best first. The configs themselves outlive the array.
        let config = unsafe { *configs };
        unsafe {
            (server.xlib.XFree)(configs as *mut c_void);
        }

        let info = unsafe { (server.glx.glXGetVisualFromFBConfig)(server.display, config) };
        if info.is_null() {
            return Err(Error::PixelFormat(
                "framebuffer configuration has no X visual".to_string(),
            ));
        }

        let chosen = unsafe {
            let chosen = Self {
                config,
                visual: (*info).visual,
                visual_id: (*info).visualid,
                depth: (*info).depth,
            };
            (server.xlib.XFree)(info as *mut c_void);
            chosen
        };

        debug!(target: LOG_TAG, "Using visual {:#x}, depth {}", chosen.visual_id, chosen.depth);

        Ok(chosen)
    }
}

fn framebuffer_attributes(settings: &ContextSettings) -> Vec<c_int> {
    let mut attributes = vec![
        glx::GLX_X_RENDERABLE,
        1,
        glx::GLX_DRAWABLE_TYPE,
        glx::GLX_WINDOW_BIT,
        glx::GLX_RENDER_TYPE,
        glx::GLX_RGBA_BIT,
        glx::GLX_X_VISUAL_TYPE,
        glx::GLX_TRUE_COLOR,
        glx::GLX_RED_SIZE,
        8,
        glx::GLX_GREEN_SIZE,
        8,
        glx::GLX_BLUE_SIZE,
        8,
        glx::GLX_ALPHA_SIZE,
        8,
        glx::GLX_DEPTH_SIZE,
        settings.depth_bits() as c_int,
        glx::GLX_STENCIL_SIZE,
        settings.stencil_bits() as c_int,
        glx::GLX_DOUBLEBUFFER,
        settings.double_buffer() as c_int,
    ];

    let samples = settings.antialiasing().samples();
    if samples > 0 {
        attributes.extend_from_slice(&[
            glx::GLX_SAMPLE_BUFFERS,
            1,
            glx::GLX_SAMPLES,
            samples as c_int,
        ]);
    }

    attributes.push(0);
    attributes
}

pub(crate) struct X11GraphicContext {
    server: Rc<X11Server>,
    window: xlib::Window,
    context: glx::GLXContext,
}

impl X11GraphicContext {
    pub(super) fn create(
        server: &Rc<X11Server>,
        config: &FramebufferConfig,
        window: &NativeWindow,
        settings: &ContextSettings,
    ) -> Result<Self> {
        let versioned = settings
            .version()
            .and_then(|version| create_versioned(server, config, version));

        let context = match versioned {
            Some(context) => context,
            None => unsafe {
                (server.glx.glXCreateNewContext)(
                    server.display,
                    config.config,
                    glx::GLX_RGBA_TYPE,
                    ptr::null_mut(),
                    xlib::True,
                )
            },
        };

        if context.is_null() {
            return Err(Error::ContextCreation(
                "glXCreateNewContext returned no context".to_string(),
            ));
        }

        Ok(Self {
            server: server.clone(),
            window: window.id(),
            context,
        })
    }
}

/// `None` when the driver lacks GLX_ARB_create_context or refuses the version.
fn create_versioned(
    server: &X11Server,
    config: &FramebufferConfig,
    version: ContextVersion,
) -> Option<glx::GLXContext> {
    let name = c"glXCreateContextAttribsARB";
    let address = unsafe { (server.glx.glXGetProcAddressARB)(name.as_ptr() as *const c_uchar) };
    let Some(address) = address else {
        warn!(target: LOG_TAG, "glXCreateContextAttribsARB unavailable, using the default context");
        return None;
    };

    let attributes = version_attributes(version);
    let context = unsafe {
        let create: CreateContextAttribs = mem::transmute(address);
        let context = create(
            server.display,
            config.config,
            ptr::null_mut(),
            xlib::True,
            attributes.as_ptr(),
        );
        // Refusals arrive as X errors, make sure they are logged before we move on.
        (server.xlib.XSync)(server.display, xlib::False);
        context
    };

    if context.is_null() {
        warn!(
            target: LOG_TAG,
            "OpenGL {}.{} context refused, using the default context", version.major, version.minor
        );
        return None;
    }

    debug!(target: LOG_TAG, "Created OpenGL {}.{} context", version.major, version.minor);
    Some(context)
}

impl GraphicContext for X11GraphicContext {
    fn valid(&self) -> bool {
        !self.context.is_null()
    }

    fn is_current(&self) -> bool {
        self.valid() && unsafe { (self.server.glx.glXGetCurrentContext)() } == self.context
    }

    fn make_current(&self) {
        if self.server.display.is_null() || self.window == 0 {
            error!(target: LOG_TAG, "make_current called without a display or window");
            debug_assert!(false, "make_current called without a display or window");
            return;
        }

        let bound = unsafe {
            (self.server.glx.glXMakeCurrent)(self.server.display, self.window, self.context)
        };

        if bound == 0 {
            warn!(target: LOG_TAG, "glXMakeCurrent failed for window {:#x}", self.window);
        }
    }

    fn swap_buffers(&self) {
        unsafe {
            (self.server.glx.glXSwapBuffers)(self.server.display, self.window);
        }
    }
}

impl Drop for X11GraphicContext {
    fn drop(&mut self) {
        unsafe {
            if self.is_current() {
                (self.server.glx.glXMakeCurrent)(self.server.display, 0, ptr::null_mut());
            }
            (self.server.glx.glXDestroyContext)(self.server.display, self.context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::context::Antialiasing;

    fn value_of(attributes: &[c_int], key: c_int) -> Option<c_int> {
        attributes
            .chunks(2)
            .find(|pair| pair[0] == key)
            .and_then(|pair| pair.get(1).copied())
    }

    #[test]
    fn attributes_follow_settings() {
        let attributes = framebuffer_attributes(
            &ContextSettings::default()
                .with_depth_bits(16)
                .with_double_buffer(false),
        );

        assert_eq!(attributes.last(), Some(&0));
        assert_eq!(value_of(&attributes, glx::GLX_DEPTH_SIZE), Some(16));
        assert_eq!(value_of(&attributes, glx::GLX_STENCIL_SIZE), Some(8));
        assert_eq!(value_of(&attributes, glx::GLX_DOUBLEBUFFER), Some(0));
        assert_eq!(value_of(&attributes, glx::GLX_SAMPLES), None);
    }

    #[test]
    fn multisampling_requests_sample_buffers() {
        let attributes = framebuffer_attributes(
            &ContextSettings::default().with_antialiasing(Antialiasing::X4),
        );

        assert_eq!(value_of(&attributes, glx::GLX_SAMPLE_BUFFERS), Some(1));
        assert_eq!(value_of(&attributes, glx::GLX_SAMPLES), Some(4));
    }

    #[test]
    fn version_keys_match_glx() {
        let attributes = version_attributes(ContextVersion::new(3, 3));

        assert_eq!(value_of(&attributes, glx::arb::GLX_CONTEXT_MAJOR_VERSION_ARB), Some(3));
        assert_eq!(value_of(&attributes, glx::arb::GLX_CONTEXT_MINOR_VERSION_ARB), Some(3));
        assert_eq!(attributes.last(), Some(&0));
    }
}
