//! Lazily opened, reference counted process resources.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Holds a weak reference to a shared native resource.
///
/// The first [`acquire`](SharedSlot::acquire) opens the resource, later calls hand out the same
/// [`Rc`] for as long as anybody keeps one alive. Once the last strong reference is gone the
/// resource is dropped and the next `acquire` opens a fresh one.
pub(crate) struct SharedSlot<T> {
    slot: RefCell<Weak<T>>,
}

impl<T> SharedSlot<T> {
    pub const fn new() -> Self {
        Self {
            slot: RefCell::new(Weak::new()),
        }
    }

    pub fn acquire<E>(&self, open: impl FnOnce() -> Result<T, E>) -> Result<Rc<T>, E> {
        let existing = self.slot.borrow().upgrade();
        if let Some(shared) = existing {
            return Ok(shared);
        }

        let shared = Rc::new(open()?);
        *self.slot.borrow_mut() = Rc::downgrade(&shared);

        Ok(shared)
    }

    #[cfg(test)]
    pub fn is_live(&self) -> bool {
        self.slot.borrow().strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Connection<'a> {
        closed: &'a Cell<u32>,
    }

    impl Drop for Connection<'_> {
        fn drop(&mut self) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    #[test]
    fn shares_while_alive() {
        let opened = Cell::new(0);
        let closed = Cell::new(0);
        let slot = SharedSlot::new();

        let open = || {
            opened.set(opened.get() + 1);
            Ok::<_, ()>(Connection { closed: &closed })
        };

        let first = slot.acquire(open).unwrap();
        let second = slot.acquire(open).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(opened.get(), 1);

        drop(first);
        assert!(slot.is_live());
        drop(second);
        assert!(!slot.is_live());
        assert_eq!(closed.get(), 1);

        let _third = slot.acquire(open).unwrap();
        assert_eq!(opened.get(), 2);
    }

    #[test]
    fn released_after_any_drop_order() {
        let closed = Cell::new(0);
        let slot = SharedSlot::new();

        let mut handles: Vec<_> = (0..8)
            .map(|_| {
                slot.acquire(|| Ok::<_, ()>(Connection { closed: &closed }))
                    .unwrap()
            })
            .collect();

        for index in [3, 0, 5, 1, 3, 0, 1, 0] {
            assert!(slot.is_live());
            handles.remove(index);
        }

        assert!(handles.is_empty());
        assert!(!slot.is_live());
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn failed_open_leaves_slot_empty() {
        let slot: SharedSlot<u32> = SharedSlot::new();

        assert_eq!(slot.acquire(|| Err("no display")), Err("no display"));
        assert!(!slot.is_live());
        assert_eq!(*slot.acquire(|| Ok::<_, ()>(7)).unwrap(), 7);
    }
}
