//! Error types

use thiserror::Error;

/// Which native resource failed to come into existence.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    /// Connection to the windowing system (X display, module handle, client library).
    Platform,
    /// Window class registration (Win32 only).
    WindowClass,
    /// The native window itself.
    Window,
    /// X input context.
    InputContext,
    /// Framebuffer configuration / pixel format.
    PixelFormat,
    /// OpenGL rendering context.
    Context,
    /// Caller supplied data that can't be handed to the OS.
    Argument,
}

/// Construction failures. Everything acquired before the failing step has already been released
/// by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("windowing system unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("failed to register window class: {0}")]
    ClassRegistration(String),

    #[error("failed to create window: {0}")]
    WindowCreation(String),

    #[error("failed to create input context: {0}")]
    InputContext(String),

    #[error("no suitable pixel format: {0}")]
    PixelFormat(String),

    #[error("failed to create graphic context: {0}")]
    ContextCreation(String),

    #[error("title contains a nul character at index {0}")]
    InvalidTitle(usize),
}

impl Error {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Error::PlatformUnavailable(_) => ResourceKind::Platform,
            Error::ClassRegistration(_) => ResourceKind::WindowClass,
            Error::WindowCreation(_) => ResourceKind::Window,
            Error::InputContext(_) => ResourceKind::InputContext,
            Error::PixelFormat(_) => ResourceKind::PixelFormat,
            Error::ContextCreation(_) => ResourceKind::Context,
            Error::InvalidTitle(_) => ResourceKind::Argument,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
