//! Platform neutral window state.
//!
//! Backends translate native notifications into [`WindowEvent`]s and feed them to
//! [`WindowState::process`]. The facade getters only ever read from here, so the cached
//! geometry is always the last geometry the OS confirmed.

use crate::os::window::{WindowPosition, WindowSize};

/// Window-manager owned state flags (EWMH `_NET_WM_STATE` on X11).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct WmState {
    pub maximized: bool,
    pub fullscreen: bool,
    pub hidden: bool,
}

/// How a resize came about (the `WM_SIZE` request type on Win32).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ResizeKind {
    Restored,
    Minimized,
    Maximized,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum WindowEvent {
    Mapped,
    Unmapped,
    Visibility { obscured: bool },
    /// Outer frame position and client size, both confirmed by the OS.
    Configure { position: WindowPosition, size: WindowSize },
    Moved(WindowPosition),
    Resized { size: WindowSize, kind: ResizeKind },
    Focus(bool),
    WmState(WmState),
    CloseRequested,
    Destroyed,
}

/// Which state `restore()` has to undo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RestoreTarget {
    Fullscreen,
    Iconified,
    Maximized,
}

/// Min/max client size. A zero size means "no limit".
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct SizeLimits {
    pub min: WindowSize,
    pub max: WindowSize,
}

impl SizeLimits {
    pub fn has_min(&self) -> bool {
        !self.min.is_zero()
    }

    pub fn has_max(&self) -> bool {
        !self.max.is_zero()
    }

    /// Clamp a requested size into the limits. The minimum wins over a conflicting maximum.
    pub fn clamp(&self, size: WindowSize) -> WindowSize {
        let mut out = size;

        if self.has_max() {
            out.width = out.width.min(self.max.width);
            out.height = out.height.min(self.max.height);
        }

        if self.has_min() {
            out.width = out.width.max(self.min.width);
            out.height = out.height.max(self.min.height);
        }

        out
    }
}

#[derive(Clone, Debug)]
pub(crate) struct WindowState {
    pub size: WindowSize,
    pub position: WindowPosition,
    pub limits: SizeLimits,
    pub resizable: bool,

    pub mapped: bool,
    pub obscured: bool,
    pub focused: bool,
    pub iconified: bool,
    pub maximized: bool,
    pub fullscreen: bool,
    /// Fullscreen as last reported by the window manager, independent of local requests.
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    pub wm_fullscreen: bool,

    pub close_requested: bool,
    pub destroyed: bool,
}

impl WindowState {
    pub fn new(size: WindowSize, position: WindowPosition, resizable: bool) -> Self {
        Self {
            size,
            position,
            limits: SizeLimits::default(),
            resizable,
            mapped: false,
            obscured: false,
            focused: false,
            iconified: false,
            maximized: false,
            fullscreen: false,
            wm_fullscreen: false,
            close_requested: false,
            destroyed: false,
        }
    }

    pub fn process(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Mapped => {
                self.mapped = true;
                // ICCCM: a mapped top-level is in NormalState.
                self.iconified = false;
            }
            WindowEvent::Unmapped => {
                self.mapped = false;
            }
            WindowEvent::Visibility { obscured } => {
                self.obscured = obscured;
            }
            WindowEvent::Configure { position, size } => {
                self.position = position;
                self.size = size;
            }
            WindowEvent::Moved(position) => {
                self.position = position;
            }
            WindowEvent::Resized { size, kind } => match kind {
                // Minimized windows report an empty client area, keep the last real size.
                ResizeKind::Minimized => self.iconified = true,
                ResizeKind::Maximized => {
                    self.iconified = false;
                    self.maximized = true;
                    self.size = size;
                }
                ResizeKind::Restored => {
                    self.iconified = false;
                    self.maximized = false;
                    self.size = size;
                }
            },
            WindowEvent::Focus(focused) => {
                self.focused = focused;
            }
            WindowEvent::WmState(state) => {
                self.maximized = state.maximized;
                self.fullscreen = state.fullscreen;
                self.wm_fullscreen = state.fullscreen;
                self.iconified = state.hidden;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Destroyed => {
                self.destroyed = true;
                self.mapped = false;
                self.focused = false;
            }
        }
    }

    pub fn visible(&self) -> bool {
        self.mapped && !self.iconified && !self.destroyed
    }

    /// Fullscreen overrides whatever the window manager thinks about maximization.
    pub fn maximized(&self) -> bool {
        self.maximized && !self.fullscreen
    }

    pub fn restore_target(&self) -> Option<RestoreTarget> {
        if self.fullscreen {
            Some(RestoreTarget::Fullscreen)
        } else if self.iconified {
            Some(RestoreTarget::Iconified)
        } else if self.maximized {
            Some(RestoreTarget::Maximized)
        } else {
            None
        }
    }
}

/// Pre-fullscreen geometry plus whatever native style the backend needs to undo the switch.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Snapshot<T> {
    pub position: WindowPosition,
    pub size: WindowSize,
    pub native: T,
}

#[derive(Debug)]
pub(crate) struct FullscreenSlot<T> {
    saved: Option<Snapshot<T>>,
    /// Set once the window manager reported the switch as done.
    confirmed: bool,
}

impl<T> FullscreenSlot<T> {
    pub fn new() -> Self {
        Self {
            saved: None,
            confirmed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    /// Store the snapshot unless one is already held. Returns whether it was stored.
    pub fn enter(&mut self, snapshot: Snapshot<T>) -> bool {
        if self.saved.is_some() {
            return false;
        }

        self.saved = Some(snapshot);
        self.confirmed = false;
        true
    }

    pub fn leave(&mut self) -> Option<Snapshot<T>> {
        self.confirmed = false;
        self.saved.take()
    }

    /// Feed the fullscreen flag the window manager reported. Once it confirmed the switch,
    /// a later report without fullscreen means it was left externally: the snapshot is
    /// released and returned so the caller can put its own settings back.
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    pub fn observe(&mut self, reported: bool) -> Option<Snapshot<T>> {
        if self.saved.is_none() {
            return None;
        }

        if reported {
            self.confirmed = true;
            return None;
        }

        if self.confirmed { self.leave() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WindowState {
        WindowState::new(WindowSize::new(640, 480), WindowPosition::new(0, 0), true)
    }

    #[test]
    fn geometry_follows_events_only() {
        let mut state = state();
        state.process(WindowEvent::Configure {
            position: WindowPosition::new(10, 20),
            size: WindowSize::new(800, 600),
        });

        assert_eq!(state.size, WindowSize::new(800, 600));
        assert_eq!(state.position, WindowPosition::new(10, 20));

        state.process(WindowEvent::Moved(WindowPosition::new(-5, 7)));
        assert_eq!(state.position, WindowPosition::new(-5, 7));
        assert_eq!(state.size, WindowSize::new(800, 600));
    }

    #[test]
    fn visibility_tracks_last_map_event() {
        let mut state = state();
        assert!(!state.visible());

        for mapped in [true, false, true, true, false] {
            state.process(if mapped { WindowEvent::Mapped } else { WindowEvent::Unmapped });
            assert_eq!(state.visible(), mapped);
        }
    }

    #[test]
    fn minimized_resize_keeps_last_size() {
        let mut state = state();
        state.process(WindowEvent::Resized {
            size: WindowSize::new(0, 0),
            kind: ResizeKind::Minimized,
        });

        assert!(state.iconified);
        assert_eq!(state.size, WindowSize::new(640, 480));

        state.process(WindowEvent::Resized {
            size: WindowSize::new(1920, 1017),
            kind: ResizeKind::Maximized,
        });
        assert!(!state.iconified);
        assert!(state.maximized());
        assert_eq!(state.size, WindowSize::new(1920, 1017));
    }

    #[test]
    fn fullscreen_hides_maximized() {
        let mut state = state();
        state.process(WindowEvent::WmState(WmState {
            maximized: true,
            fullscreen: true,
            hidden: false,
        }));

        assert!(state.fullscreen);
        assert!(!state.maximized());
        assert_eq!(state.restore_target(), Some(RestoreTarget::Fullscreen));
    }

    #[test]
    fn restore_priority() {
        let mut state = state();
        assert_eq!(state.restore_target(), None);

        state.maximized = true;
        assert_eq!(state.restore_target(), Some(RestoreTarget::Maximized));

        state.iconified = true;
        assert_eq!(state.restore_target(), Some(RestoreTarget::Iconified));

        state.fullscreen = true;
        assert_eq!(state.restore_target(), Some(RestoreTarget::Fullscreen));
    }

    #[test]
    fn mapping_clears_iconified() {
        let mut state = state();
        state.process(WindowEvent::WmState(WmState {
            hidden: true,
            ..Default::default()
        }));
        assert!(state.iconified);
        assert!(!state.visible());

        state.process(WindowEvent::Mapped);
        assert!(!state.iconified);
        assert!(state.visible());
    }

    #[test]
    fn destroy_and_close() {
        let mut state = state();
        state.process(WindowEvent::Mapped);
        state.process(WindowEvent::Focus(true));
        state.process(WindowEvent::CloseRequested);

        assert!(state.close_requested);
        assert!(state.visible());

        state.process(WindowEvent::Destroyed);
        assert!(!state.visible());
        assert!(!state.focused);
    }

    #[test]
    fn clamp_respects_min_size() {
        let limits = SizeLimits {
            min: WindowSize::new(200, 150),
            max: WindowSize::default(),
        };

        assert_eq!(limits.clamp(WindowSize::new(100, 100)), WindowSize::new(200, 150));
        assert_eq!(limits.clamp(WindowSize::new(300, 100)), WindowSize::new(300, 150));
        assert_eq!(limits.clamp(WindowSize::new(4000, 3000)), WindowSize::new(4000, 3000));
    }

    #[test]
    fn clamp_with_both_limits() {
        let limits = SizeLimits {
            min: WindowSize::new(200, 150),
            max: WindowSize::new(800, 600),
        };
        assert_eq!(limits.clamp(WindowSize::new(1000, 50)), WindowSize::new(800, 150));

        let conflicting = SizeLimits {
            min: WindowSize::new(500, 500),
            max: WindowSize::new(300, 300),
        };
        assert_eq!(conflicting.clamp(WindowSize::new(400, 400)), WindowSize::new(500, 500));
    }

    #[test]
    fn fullscreen_slot_is_single_shot() {
        let mut slot = FullscreenSlot::new();
        let first = Snapshot {
            position: WindowPosition::new(1, 2),
            size: WindowSize::new(3, 4),
            native: 0xdead_u32,
        };

        assert!(slot.enter(first.clone()));
        assert!(!slot.enter(Snapshot {
            position: WindowPosition::new(0, 0),
            size: WindowSize::new(1920, 1080),
            native: 0,
        }));

        assert_eq!(slot.leave(), Some(first));
        assert!(!slot.is_active());
        assert_eq!(slot.leave(), None);
    }

    #[test]
    fn external_fullscreen_exit_releases_snapshot() {
        let mut state = state();
        let mut slot = FullscreenSlot::new();
        let saved = Snapshot {
            position: WindowPosition::new(40, 30),
            size: WindowSize::new(640, 480),
            native: (),
        };

        assert!(slot.enter(saved.clone()));
        state.fullscreen = true;

        // The request is still in flight, nothing to release yet.
        assert_eq!(slot.observe(state.wm_fullscreen), None);
        assert!(slot.is_active());

        state.process(WindowEvent::WmState(WmState {
            fullscreen: true,
            ..Default::default()
        }));
        assert_eq!(slot.observe(state.wm_fullscreen), None);

        // Left through a window manager shortcut.
        state.process(WindowEvent::WmState(WmState::default()));
        assert!(!state.fullscreen);
        assert_eq!(slot.observe(state.wm_fullscreen), Some(saved));
        assert!(!slot.is_active());
        assert_eq!(state.restore_target(), None);

        // A fresh switch can be made afterwards.
        assert!(slot.enter(Snapshot {
            position: WindowPosition::new(0, 0),
            size: WindowSize::new(800, 600),
            native: (),
        }));
    }

    #[test]
    fn obscured_window_stays_visible() {
        let mut state = state();
        state.process(WindowEvent::Mapped);
        state.process(WindowEvent::Visibility { obscured: true });

        assert!(state.obscured);
        assert!(state.visible());

        state.process(WindowEvent::Visibility { obscured: false });
        assert!(!state.obscured);
    }
}
