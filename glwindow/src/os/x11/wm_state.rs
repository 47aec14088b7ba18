//! ICCCM / EWMH atoms and `_NET_WM_STATE` decoding

use crate::os::state::WmState;
use std::ffi::{CStr, c_int, c_long, c_ulong};
use x11_dl::xlib;
use x11_dl::xlib::Xlib;

pub(super) const NET_WM_STATE_REMOVE: c_long = 0;
pub(super) const NET_WM_STATE_ADD: c_long = 1;

/// ICCCM `WM_HINTS` initial state of a window that should come up normal, not iconic.
pub(super) const NORMAL_STATE: c_int = 1;

/// Source indication for `_NET_ACTIVE_WINDOW`: a regular application.
pub(super) const SOURCE_APPLICATION: c_long = 1;

#[derive(Copy, Clone, Debug)]
pub(super) struct Atoms {
    pub wm_protocols: xlib::Atom,
    pub wm_delete_window: xlib::Atom,
    pub net_wm_state: xlib::Atom,
    pub net_wm_state_maximized_vert: xlib::Atom,
    pub net_wm_state_maximized_horz: xlib::Atom,
    pub net_wm_state_fullscreen: xlib::Atom,
    pub net_wm_state_hidden: xlib::Atom,
    pub net_active_window: xlib::Atom,
    pub net_wm_name: xlib::Atom,
    pub net_frame_extents: xlib::Atom,
    pub utf8_string: xlib::Atom,
}

impl Atoms {
    /// # Safety
    /// `display` must be an open connection.
    pub(super) unsafe fn intern(xlib: &Xlib, display: *mut xlib::Display) -> Self {
        let intern =
            |name: &CStr| unsafe { (xlib.XInternAtom)(display, name.as_ptr(), xlib::False) };

        Self {
            wm_protocols: intern(c"WM_PROTOCOLS"),
            wm_delete_window: intern(c"WM_DELETE_WINDOW"),
            net_wm_state: intern(c"_NET_WM_STATE"),
            net_wm_state_maximized_vert: intern(c"_NET_WM_STATE_MAXIMIZED_VERT"),
            net_wm_state_maximized_horz: intern(c"_NET_WM_STATE_MAXIMIZED_HORZ"),
            net_wm_state_fullscreen: intern(c"_NET_WM_STATE_FULLSCREEN"),
            net_wm_state_hidden: intern(c"_NET_WM_STATE_HIDDEN"),
            net_active_window: intern(c"_NET_ACTIVE_WINDOW"),
            net_wm_name: intern(c"_NET_WM_NAME"),
            net_frame_extents: intern(c"_NET_FRAME_EXTENTS"),
            utf8_string: intern(c"UTF8_STRING"),
        }
    }

    /// Maximized needs both axes, a window maximized along one axis only is not "maximized".
    pub(super) fn decode_wm_state(&self, values: &[xlib::Atom]) -> WmState {
        let has = |atom: xlib::Atom| values.contains(&atom);

        WmState {
            maximized: has(self.net_wm_state_maximized_vert)
                && has(self.net_wm_state_maximized_horz),
            fullscreen: has(self.net_wm_state_fullscreen),
            hidden: has(self.net_wm_state_hidden),
        }
    }

    pub(super) fn maximized_pair(&self) -> (xlib::Atom, xlib::Atom) {
        (
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
        )
    }
}

/// Apply an `_NET_WM_STATE` add/remove to a property value the way a window manager would. Used
/// for windows that are not mapped yet, where EWMH asks clients to edit the property directly.
pub(super) fn edit_state_list(
    current: &[xlib::Atom],
    action: c_long,
    atoms: &[xlib::Atom],
) -> Vec<xlib::Atom> {
    let mut out: Vec<xlib::Atom> = current
        .iter()
        .copied()
        .filter(|atom| action == NET_WM_STATE_ADD || !atoms.contains(atom))
        .collect();

    if action == NET_WM_STATE_ADD {
        for atom in atoms.iter().copied().filter(|&atom| atom != 0) {
            if !out.contains(&atom) {
                out.push(atom);
            }
        }
    }

    out
}

/// `_NET_FRAME_EXTENTS` is left, right, top, bottom. Returns the offset of the client area from
/// the outer frame, zero when the window manager did not set the property.
pub(super) fn frame_offset(extents: &[c_ulong]) -> (i32, i32) {
    match extents {
        [left, _, top, _, ..] => (*left as i32, *top as i32),
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atoms() -> Atoms {
        Atoms {
            wm_protocols: 1,
            wm_delete_window: 2,
            net_wm_state: 3,
            net_wm_state_maximized_vert: 4,
            net_wm_state_maximized_horz: 5,
            net_wm_state_fullscreen: 6,
            net_wm_state_hidden: 7,
            net_active_window: 8,
            net_wm_name: 9,
            net_frame_extents: 10,
            utf8_string: 11,
        }
    }

    #[test]
    fn decode_needs_both_maximized_axes() {
        let atoms = atoms();

        assert!(!atoms.decode_wm_state(&[4]).maximized);
        assert!(atoms.decode_wm_state(&[5, 4]).maximized);
        assert_eq!(atoms.decode_wm_state(&[]), WmState::default());
    }

    #[test]
    fn decode_fullscreen_and_hidden() {
        let state = atoms().decode_wm_state(&[42, 6, 7]);

        assert!(state.fullscreen);
        assert!(state.hidden);
        assert!(!state.maximized);
    }

    #[test]
    fn edit_list_adds_once_and_removes() {
        let added = edit_state_list(&[42, 4], NET_WM_STATE_ADD, &[4, 5]);
        assert_eq!(added, vec![42, 4, 5]);

        let removed = edit_state_list(&added, NET_WM_STATE_REMOVE, &[4, 5]);
        assert_eq!(removed, vec![42]);

        // second atom slot unused
        assert_eq!(edit_state_list(&[], NET_WM_STATE_ADD, &[6, 0]), vec![6]);
    }

    #[test]
    fn frame_offset_is_left_and_top() {
        assert_eq!(frame_offset(&[4, 6, 28, 4]), (4, 28));
        assert_eq!(frame_offset(&[]), (0, 0));
        assert_eq!(frame_offset(&[1, 2]), (0, 0));
    }

    #[test]
    fn initial_state_is_normal() {
        // ICCCM 4.1.3.1: WithdrawnState 0, NormalState 1, IconicState 3
        assert_eq!(NORMAL_STATE, 1);
    }
}
