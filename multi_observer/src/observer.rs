use std::fmt;
use std::rc::Rc;

use dom::{Exception, MutationObserver, MutationObserverInit, MutationRecord, Node};

/// A change-observation primitive that registers one node at a time.
///
/// [`MultiObserver`](crate::MultiObserver) owns one of these and forwards to it;
/// it never produces records or errors of its own.
pub trait Observer {
    type Record;
    type Error: fmt::Display;

    fn observe(&self, node: &Rc<Node>, options: &MutationObserverInit) -> Result<(), Self::Error>;

    fn disconnect(&self);

    fn take_records(&self) -> Vec<Self::Record>;
}

impl Observer for Rc<MutationObserver> {
    type Record = MutationRecord;
    type Error = Exception;

    fn observe(&self, node: &Rc<Node>, options: &MutationObserverInit) -> Result<(), Exception> {
        MutationObserver::observe(self, node, options)
    }

    fn disconnect(&self) {
        MutationObserver::disconnect(self)
    }

    fn take_records(&self) -> Vec<MutationRecord> {
        MutationObserver::take_records(self)
    }
}
