//! `StreamHandle<T>`: a typed, mutable single-cell carrier of one value
//! per step (spec §4.4, §9 "Stream handles as mailboxes").
//!
//! "These are single-cell containers acting as one-shot channels within
//! a step. Implement as an owned cell with optional contents; writers
//! set, readers observe and clear. Not a shared queue, not an async
//! channel." `take` implements the clearing, one-shot-delta reader;
//! `peek` is the non-clearing reader used by broadcast-style values (the
//! clock, a trace snapshot) that more than one node may observe in the
//! same step.

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

pub struct StreamHandle<T> {
    name: Rc<str>,
    cell: Rc<RefCell<Option<T>>>,
}

impl<T> StreamHandle<T> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: Rc::from(name.into().as_str()),
            cell: Rc::new(RefCell::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The external producer (or an upstream node) sets the value before
    /// the step that should observe it.
    pub fn write(&self, value: T) {
        *self.cell.borrow_mut() = Some(value);
    }

    /// One-shot read: takes the value, leaving the mailbox empty. Used by
    /// a single downstream consumer of a delta edge.
    pub fn take(&self) -> Option<T> {
        self.cell.borrow_mut().take()
    }

    /// Non-clearing read, for broadcast-style values more than one node
    /// may observe within the same step (the clock, a trace snapshot).
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.borrow().is_none()
    }
}

impl<T> Clone for StreamHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            cell: self.cell.clone(),
        }
    }
}

impl<T> Debug for StreamHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "StreamHandle({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_mailbox() {
        let handle: StreamHandle<i32> = StreamHandle::new("h");
        handle.write(42);
        assert_eq!(handle.take(), Some(42));
        assert_eq!(handle.take(), None);
    }

    #[test]
    fn peek_does_not_clear() {
        let handle: StreamHandle<i32> = StreamHandle::new("h");
        handle.write(7);
        assert_eq!(handle.peek(), Some(7));
        assert_eq!(handle.peek(), Some(7));
    }

    #[test]
    fn clones_share_the_same_cell() {
        let handle: StreamHandle<i32> = StreamHandle::new("h");
        let clone = handle.clone();
        handle.write(1);
        assert_eq!(clone.take(), Some(1));
    }
}
