// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notifications emitted by the complex.
//!
//! Observers are called synchronously after the mutation that caused the
//! notification has completed. Repeated notifications within one logical
//! edit are coalescible.

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    /// Something visible changed, a redraw is needed.
    Changed,
    /// A user-meaningful edit completed (undo boundary).
    Checkpoint,
    /// Pick ids are stale.
    NeedUpdatePicking,
    /// The selection set changed.
    SelectionChanged,
}

/// Receiver of [`Notification`]s.
pub trait VacObserver {
    fn notify(&mut self, notification: Notification);
}

impl<F: FnMut(Notification)> VacObserver for F {
    fn notify(&mut self, notification: Notification) {
        self(notification)
    }
}

/// Observer list owned by the complex.
#[derive(Default)]
pub struct Observers {
    list: Vec<Box<dyn VacObserver>>,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.list.len())
            .finish()
    }
}

impl Observers {
    pub fn push(&mut self, observer: Box<dyn VacObserver>) {
        self.list.push(observer);
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn emit(&mut self, notification: Notification) {
        for o in &mut self.list {
            o.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn closures_observe() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut observers = Observers::default();
        observers.push(Box::new(move |n| sink.borrow_mut().push(n)));
        observers.emit(Notification::Changed);
        observers.emit(Notification::Checkpoint);
        assert_eq!(*log.borrow(), vec![Notification::Changed, Notification::Checkpoint]);
    }
}
