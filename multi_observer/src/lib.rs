//! One mutation observer, many targets.
//!
//! [`MultiObserver`] takes a single node, a sequence of nodes, or a live node
//! list together with one set of options and one callback, and registers every
//! node with the underlying [`MutationObserver`] when [`MultiObserver::observe`]
//! is called. Detection and delivery stay entirely with the observer.
//!
//! ```
//! use dom::{Agent, MutationObserver, MutationObserverInit, MutationRecord, Node};
//! use multi_observer::MultiObserver;
//!
//! let agent = Agent::new();
//! let list = Node::new_element("ul");
//! let aside = Node::new_element("aside");
//!
//! let observer = MultiObserver::new(
//!     &agent,
//!     vec![list.clone(), aside.clone()],
//!     MutationObserverInit {
//!         child_list: true,
//!         ..Default::default()
//!     },
//!     |records: &[MutationRecord], _: &MutationObserver| println!("{} changes", records.len()),
//! );
//! observer.observe().unwrap();
//!
//! list.append_child(&Node::new_element("li")).unwrap();
//! aside.append_child(&Node::new_text("note")).unwrap();
//! agent.perform_microtask_checkpoint();
//! ```

use std::cell::Cell;
use std::rc::Rc;

use dom::{Agent, MutationObserver, MutationObserverInit, MutationRecord, Node};
use tracing::{debug, trace, warn};

mod observer;
mod target;

pub use observer::Observer;
pub use target::ObservationTarget;

#[derive(Debug)]
pub struct MultiObserver<O: Observer = Rc<MutationObserver>> {
    observer: O,
    target: ObservationTarget,
    options: MutationObserverInit,
    observing: Cell<bool>,
}

impl MultiObserver {
    /// Creates the underlying [`MutationObserver`] with `callback` and wraps it.
    ///
    /// Observed nodes keep the callback alive until [`disconnect`](Self::disconnect),
    /// so a callback that needs a target node should capture a
    /// [`Weak`](std::rc::Weak) handle to it rather than an `Rc`, which would
    /// leak the node and the observer.
    pub fn new<F>(
        agent: &Rc<Agent>,
        target: impl Into<ObservationTarget>,
        options: MutationObserverInit,
        callback: F,
    ) -> Self
    where
        F: Fn(&[MutationRecord], &MutationObserver) + 'static,
    {
        Self::with_observer(MutationObserver::new(agent, callback), target, options)
    }
}

impl<O: Observer> MultiObserver<O> {
    pub fn with_observer(
        observer: O,
        target: impl Into<ObservationTarget>,
        options: MutationObserverInit,
    ) -> Self {
        Self {
            observer,
            target: target.into(),
            options,
            observing: Cell::new(false),
        }
    }

    /// Registers every target node with the stored options, in order.
    ///
    /// The first rejection is returned as is and the remaining nodes are left
    /// unregistered.
    pub fn observe(&self) -> Result<(), O::Error> {
        match &self.target {
            ObservationTarget::Node(node) => self.observe_node(node),
            ObservationTarget::Nodes(nodes) => self.observe_each(nodes),
            ObservationTarget::NodeList(node_list) => self.observe_each(&node_list.nodes()),
        }
    }

    pub fn disconnect(&self) {
        self.observer.disconnect();
        self.observing.set(false);
    }

    pub fn take_records(&self) -> Vec<O::Record> {
        self.observer.take_records()
    }

    /// Whether at least one node has been registered since construction or the
    /// last [`disconnect`](Self::disconnect).
    pub fn is_observing(&self) -> bool {
        self.observing.get()
    }

    pub fn target(&self) -> &ObservationTarget {
        &self.target
    }

    pub fn options(&self) -> &MutationObserverInit {
        &self.options
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    fn observe_each(&self, nodes: &[Rc<Node>]) -> Result<(), O::Error> {
        debug!(nodes = nodes.len(), "observing targets");
        for node in nodes {
            self.observe_node(node)?;
        }
        Ok(())
    }

    fn observe_node(&self, node: &Rc<Node>) -> Result<(), O::Error> {
        if let Err(error) = self.observer.observe(node, &self.options) {
            warn!(node = %node.data, %error, "observer rejected target");
            return Err(error);
        }
        trace!(node = %node.data, "observing target");
        self.observing.set(true);
        Ok(())
    }
}
