use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::mutation_observer::MutationObserver;

// SPECLINK: https://html.spec.whatwg.org/multipage/webappapis.html#similar-origin-window-agent
/// The part of an event loop that mutation observers rely on.
///
/// There is no real event loop here: the embedder decides when script has
/// finished running and calls [`Agent::perform_microtask_checkpoint`], which
/// is when queued records reach their callbacks.
#[derive(Debug, Default)]
pub struct Agent {
    mutation_observer_microtask_queued: Cell<bool>,
    pending_mutation_observers: RefCell<Vec<Rc<MutationObserver>>>,
}

impl Agent {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn has_pending_microtask(&self) -> bool {
        self.mutation_observer_microtask_queued.get()
    }

    // SPECLINK: https://html.spec.whatwg.org/multipage/webappapis.html#perform-a-microtask-checkpoint
    pub fn perform_microtask_checkpoint(&self) {
        if self.has_pending_microtask() {
            self.notify_mutation_observers();
        }
    }

    pub(crate) fn append_pending_mutation_observer(&self, observer: &Rc<MutationObserver>) {
        let mut pending = self.pending_mutation_observers.borrow_mut();
        if !pending.iter().any(|pending| Rc::ptr_eq(pending, observer)) {
            pending.push(observer.clone());
        }
    }

    // SPECLINK: https://dom.spec.whatwg.org/#queue-a-mutation-observer-compound-microtask
    pub(crate) fn queue_mutation_observer_microtask(&self) {
        // 1. If the surrounding agent's mutation observer microtask queued is true, then return.
        // 2. Set the surrounding agent's mutation observer microtask queued to true.
        // 3. Queue a microtask to notify mutation observers.
        self.mutation_observer_microtask_queued.set(true);
    }

    // SPECLINK: https://dom.spec.whatwg.org/#notify-mutation-observers
    fn notify_mutation_observers(&self) {
        // 1. Set the surrounding agent's mutation observer microtask queued to false.
        self.mutation_observer_microtask_queued.set(false);

        // 2. Let notifySet be a clone of the surrounding agent's pending mutation observers.
        // 3. Empty the surrounding agent's pending mutation observers.
        let notify_set = std::mem::take(&mut *self.pending_mutation_observers.borrow_mut());
        debug!(observers = notify_set.len(), "notifying mutation observers");

        // 5. For each mo of notifySet:
        for observer in notify_set.iter() {
            // 5.1. Let records be a clone of mo's record queue.
            // 5.2. Empty mo's record queue.
            let records = observer.take_records();

            // 5.3. For each node of mo's node list, remove all transient registered observers
            //      whose observer is mo from node's registered observer list.
            observer.remove_transient_registered_observers();

            // 5.4. If records is not empty, then invoke mo's callback with « records, mo » and
            //      "report", and with callback this value mo.
            if !records.is_empty() {
                observer.invoke_callback(&records);
            }
        }
    }
}
