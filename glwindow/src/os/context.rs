//! OpenGL context capability and creation settings

use serde::{Deserialize, Serialize};
use std::ffi::c_int;

// Same values in GLX_ARB_create_context and WGL_ARB_create_context.
const CONTEXT_MAJOR_VERSION: c_int = 0x2091;
const CONTEXT_MINOR_VERSION: c_int = 0x2092;

/// The rendering context attached to a [`Window`](crate::Window).
///
/// A context moves through `valid → (current ⇄ not current) → released`. It is released together
/// with its window, which is why [`Window::context`](crate::Window::context) only hands out a
/// borrow.
///
/// Contexts are not bound to any particular thread beyond "the last thread that called
/// [`make_current`](GraphicContext::make_current)". Calling into the same context from two threads
/// at once needs external synchronization.
pub trait GraphicContext {
    /// Native context creation succeeded.
    fn valid(&self) -> bool;

    /// The context is bound on the calling thread.
    fn is_current(&self) -> bool;

    /// Bind the context (and its window as drawable) to the calling thread.
    fn make_current(&self);

    /// Present the back buffer.
    ///
    /// The context must be current. This is not checked; what happens otherwise is up to the
    /// driver.
    fn swap_buffers(&self);
}

/// Multisampling level requested for the default framebuffer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Antialiasing {
    #[default]
    None,
    X2,
    X4,
    X8,
}

impl Antialiasing {
    pub fn samples(self) -> u8 {
        match self {
            Antialiasing::None => 0,
            Antialiasing::X2 => 2,
            Antialiasing::X4 => 4,
            Antialiasing::X8 => 8,
        }
    }
}

/// OpenGL version to ask the driver for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContextVersion {
    pub major: u8,
    pub minor: u8,
}

impl ContextVersion {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

/// Zero terminated attribute list for `*CreateContextAttribsARB`.
pub(crate) fn version_attributes(version: ContextVersion) -> [c_int; 5] {
    [
        CONTEXT_MAJOR_VERSION,
        version.major as c_int,
        CONTEXT_MINOR_VERSION,
        version.minor as c_int,
        0,
    ]
}

/// Framebuffer requirements for the graphic context.
///
/// Without a [`version`](ContextSettings::version) the driver picks, which usually means a
/// compatibility context of the newest version it supports.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    depth_bits: u8,
    stencil_bits: u8,
    antialiasing: Antialiasing,
    double_buffer: bool,
    version: Option<ContextVersion>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            depth_bits: 24,
            stencil_bits: 8,
            antialiasing: Antialiasing::None,
            double_buffer: true,
            version: None,
        }
    }
}

impl ContextSettings {
    pub fn with_depth_bits(mut self, bits: u8) -> Self {
        self.depth_bits = bits;
        self
    }

    pub fn with_stencil_bits(mut self, bits: u8) -> Self {
        self.stencil_bits = bits;
        self
    }

    pub fn with_antialiasing(mut self, level: Antialiasing) -> Self {
        self.antialiasing = level;
        self
    }

    pub fn with_double_buffer(mut self, enabled: bool) -> Self {
        self.double_buffer = enabled;
        self
    }

    /// Falls back to the driver's default context when the version is unavailable.
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.version = Some(ContextVersion::new(major, minor));
        self
    }

    pub fn depth_bits(&self) -> u8 {
        self.depth_bits
    }

    pub fn stencil_bits(&self) -> u8 {
        self.stencil_bits
    }

    pub fn antialiasing(&self) -> Antialiasing {
        self.antialiasing
    }

    pub fn double_buffer(&self) -> bool {
        self.double_buffer
    }

    pub fn version(&self) -> Option<ContextVersion> {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let settings = ContextSettings::default()
            .with_depth_bits(16)
            .with_antialiasing(Antialiasing::X4);

        assert_eq!(settings.depth_bits(), 16);
        assert_eq!(settings.stencil_bits(), 8);
        assert_eq!(settings.antialiasing().samples(), 4);
        assert!(settings.double_buffer());
        assert_eq!(settings.version(), None);

        let versioned = settings.with_version(3, 3);
        assert_eq!(versioned.version(), Some(ContextVersion::new(3, 3)));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings: ContextSettings = toml::from_str(
            r#"
            stencil_bits = 0
            antialiasing = "x8"
            "#,
        )
        .unwrap();

        assert_eq!(settings.depth_bits(), 24);
        assert_eq!(settings.stencil_bits(), 0);
        assert_eq!(settings.antialiasing(), Antialiasing::X8);
        assert_eq!(settings.version(), None);
    }

    #[test]
    fn version_from_toml() {
        let settings: ContextSettings = toml::from_str("version = { major = 4, minor = 5 }").unwrap();

        assert_eq!(settings.version(), Some(ContextVersion::new(4, 5)));
        assert_eq!(settings.depth_bits(), 24);
    }

    #[test]
    fn version_attributes_are_terminated_pairs() {
        let attributes = version_attributes(ContextVersion::new(3, 2));

        assert_eq!(attributes, [0x2091, 3, 0x2092, 2, 0]);
    }
}
