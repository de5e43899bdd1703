use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::agent::Agent;
use crate::idl::Exception;
use crate::mutation_record::MutationRecord;
use crate::node::Node;

// SPECLINK: https://dom.spec.whatwg.org/#callbackdef-mutationcallback
pub type MutationCallback = Box<dyn Fn(&[MutationRecord], &MutationObserver)>;

// SPECLINK: https://dom.spec.whatwg.org/#interface-mutationobserver
/// Watches nodes for changes and delivers batches of [`MutationRecord`]s to a
/// callback at the owning [`Agent`]'s next microtask checkpoint.
pub struct MutationObserver {
    agent: Weak<Agent>,
    callback: MutationCallback,
    node_list: RefCell<Vec<Weak<Node>>>,
    record_queue: RefCell<Vec<MutationRecord>>,
}

impl MutationObserver {
    // SPECLINK: https://dom.spec.whatwg.org/#dom-mutationobserver-mutationobserver
    /// Every observed node keeps the observer, and so `callback`, alive until
    /// [`disconnect`](Self::disconnect). A callback that captures an `Rc` to an
    /// observed node therefore forms a cycle and leaks both; capture a
    /// [`Weak`] handle instead.
    pub fn new<F>(agent: &Rc<Agent>, callback: F) -> Rc<Self>
    where
        F: Fn(&[MutationRecord], &MutationObserver) + 'static,
    {
        Rc::new(Self {
            agent: Rc::downgrade(agent),
            callback: Box::new(callback),
            node_list: RefCell::new(Vec::new()),
            record_queue: RefCell::new(Vec::new()),
        })
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-mutationobserver-observe
    pub fn observe(
        self: &Rc<Self>,
        target: &Rc<Node>,
        options: &MutationObserverInit,
    ) -> Result<(), Exception> {
        let options = options.normalized()?;

        // 7. For each registered of target's registered observer list, if registered's observer is this:
        let existing = target
            .registered_observers()
            .iter()
            .find(|registered| {
                !registered.is_transient() && Rc::ptr_eq(registered.observer(), self)
            })
            .cloned();

        match existing {
            Some(registered) => {
                // 7.1. For each node of this's node list, remove all transient registered observers
                //      whose source is registered from node's registered observer list.
                for node in self.nodes() {
                    node.retain_registered_observers(|other| !other.is_sourced_from(&registered));
                }

                // 7.2. Set registered's options to options.
                *registered.options.borrow_mut() = options;
                trace!(node = %target.data, "replaced mutation observer registration");
            }
            None => {
                // 8. Otherwise:
                //    8.1. Append a new registered observer whose observer is this and options is
                //         options to target's registered observer list.
                target.append_registered_observer(Rc::new(RegisteredObserver {
                    observer: self.clone(),
                    options: RefCell::new(options),
                    source: None,
                }));

                //    8.2. Append a weak reference to target to this's node list.
                self.append_to_node_list(target);
                trace!(node = %target.data, "registered mutation observer");
            }
        }

        Ok(())
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-mutationobserver-disconnect
    pub fn disconnect(&self) {
        // 1. For each node of this's node list, remove any registered observer from node's
        //    registered observer list for which this is the observer.
        for node in self.nodes() {
            node.retain_registered_observers(|registered| !self.is(registered.observer()));
        }
        self.node_list.borrow_mut().clear();

        // 2. Empty this's record queue.
        let dropped = std::mem::take(&mut *self.record_queue.borrow_mut());
        debug!(dropped_records = dropped.len(), "disconnected mutation observer");
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-mutationobserver-takerecords
    pub fn take_records(&self) -> Vec<MutationRecord> {
        // 1. Let records be a clone of this's record queue.
        // 2. Empty this's record queue.
        // 3. Return records.
        std::mem::take(&mut *self.record_queue.borrow_mut())
    }

    /// The nodes this observer is, or was, registered on that are still alive.
    pub fn nodes(&self) -> Vec<Rc<Node>> {
        self.node_list
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn pending_record_count(&self) -> usize {
        self.record_queue.borrow().len()
    }

    pub(crate) fn is(&self, other: &Rc<MutationObserver>) -> bool {
        std::ptr::eq(self, Rc::as_ptr(other))
    }

    pub(crate) fn append_to_node_list(&self, node: &Rc<Node>) {
        let mut node_list = self.node_list.borrow_mut();
        node_list.retain(|weak| weak.strong_count() > 0);
        if !node_list
            .iter()
            .any(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(node)))
        {
            node_list.push(Rc::downgrade(node));
        }
    }

    pub(crate) fn enqueue_record(self: &Rc<Self>, record: MutationRecord) {
        self.record_queue.borrow_mut().push(record);

        // Without an agent there is no event loop left to deliver on; records stay available
        // through take_records().
        if let Some(agent) = self.agent.upgrade() {
            agent.append_pending_mutation_observer(self);
            agent.queue_mutation_observer_microtask();
        }
    }

    pub(crate) fn remove_transient_registered_observers(&self) {
        for node in self.nodes() {
            node.retain_registered_observers(|registered| {
                !(registered.is_transient() && self.is(registered.observer()))
            });
        }
    }

    pub(crate) fn invoke_callback(&self, records: &[MutationRecord]) {
        (self.callback)(records, self);
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("nodes", &self.nodes().len())
            .field("record_queue", &self.record_queue.borrow().len())
            .finish_non_exhaustive()
    }
}

// SPECLINK: https://dom.spec.whatwg.org/#registered-observer
// A registered observer consists of an observer (a MutationObserver object) and options (a
// MutationObserverInit dictionary). A transient registered observer additionally has a source,
// the registered observer it was copied from.
#[derive(Debug)]
pub struct RegisteredObserver {
    observer: Rc<MutationObserver>,
    options: RefCell<MutationObserverInit>,
    source: Option<Weak<RegisteredObserver>>,
}

impl RegisteredObserver {
    pub(crate) fn new_transient(source: &Rc<RegisteredObserver>) -> Self {
        Self {
            observer: source.observer.clone(),
            options: RefCell::new(source.options().clone()),
            source: Some(Rc::downgrade(source)),
        }
    }

    pub fn observer(&self) -> &Rc<MutationObserver> {
        &self.observer
    }

    pub fn options(&self) -> Ref<'_, MutationObserverInit> {
        self.options.borrow()
    }

    // SPECLINK: https://dom.spec.whatwg.org/#transient-registered-observer
    pub fn is_transient(&self) -> bool {
        self.source.is_some()
    }

    fn is_sourced_from(&self, registered: &Rc<RegisteredObserver>) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| std::ptr::eq(source.as_ptr(), Rc::as_ptr(registered)))
    }
}

// SPECLINK: https://dom.spec.whatwg.org/#dictdef-mutationobserverinit
/// Which kinds of change an observer wants to hear about.
///
/// Members that are `None` were not given by the caller; `observe` fills some
/// of them in before validating. Deserializes from the camelCase DOM names,
/// e.g. `{"childList": true, "subtree": true}`.
#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MutationObserverInit {
    pub child_list: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_data: Option<bool>,
    pub subtree: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_old_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_data_old_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    /// Applies the implied defaults and rejects contradictory combinations,
    /// returning the options a registration will actually use.
    pub fn normalized(&self) -> Result<MutationObserverInit, Exception> {
        let mut options = self.clone();

        // 1. If either options["attributeOldValue"] or options["attributeFilter"] exists,
        //    and options["attributes"] does not exist, then set options["attributes"] to true.
        if (options.attribute_old_value.is_some() || options.attribute_filter.is_some())
            && options.attributes.is_none()
        {
            options.attributes = Some(true);
        }

        // 2. If options["characterDataOldValue"] exists and options["characterData"] does not
        //    exist, then set options["characterData"] to true.
        if options.character_data_old_value.is_some() && options.character_data.is_none() {
            options.character_data = Some(true);
        }

        // 3. If none of options["childList"], options["attributes"], and options["characterData"]
        //    is true, then throw a TypeError.
        if !options.child_list
            && options.attributes != Some(true)
            && options.character_data != Some(true)
        {
            return Err(Exception::TypeError(
                "The options object must set at least one of 'attributes', 'characterData', or 'childList' to true.",
            ));
        }

        // 4. If options["attributeOldValue"] is true and options["attributes"] is false,
        //    then throw a TypeError.
        if options.attribute_old_value == Some(true) && options.attributes == Some(false) {
            return Err(Exception::TypeError(
                "The options object may only set 'attributeOldValue' to true when 'attributes' is true or not present.",
            ));
        }

        // 5. If options["attributeFilter"] is present and options["attributes"] is false,
        //    then throw a TypeError.
        if options.attribute_filter.is_some() && options.attributes == Some(false) {
            return Err(Exception::TypeError(
                "The options object may only set 'attributeFilter' when 'attributes' is true or not present.",
            ));
        }

        // 6. If options["characterDataOldValue"] is true and options["characterData"] is false,
        //    then throw a TypeError.
        if options.character_data_old_value == Some(true) && options.character_data == Some(false)
        {
            return Err(Exception::TypeError(
                "The options object may only set 'characterDataOldValue' to true when 'characterData' is true or not present.",
            ));
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::agent::Agent;
    use crate::idl::Exception;
    use crate::mutation_observer::{MutationObserver, MutationObserverInit};
    use crate::mutation_record::{MutationRecord, MutationType};
    use crate::node::Node;

    fn silent_observer(agent: &Rc<Agent>) -> Rc<MutationObserver> {
        MutationObserver::new(agent, |_: &[MutationRecord], _: &MutationObserver| {})
    }

    fn child_list() -> MutationObserverInit {
        MutationObserverInit {
            child_list: true,
            ..Default::default()
        }
    }

    #[test]
    fn options_need_something_to_observe() {
        let error = MutationObserverInit::default().normalized().unwrap_err();
        assert!(matches!(error, Exception::TypeError(_)));

        let error = MutationObserverInit {
            subtree: true,
            attributes: Some(false),
            ..Default::default()
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(error, Exception::TypeError(_)));
    }

    #[test]
    fn options_imply_attributes_and_character_data() {
        let options = MutationObserverInit {
            attribute_filter: Some(vec!["class".to_string()]),
            character_data_old_value: Some(true),
            ..Default::default()
        }
        .normalized()
        .unwrap();

        assert_eq!(options.attributes, Some(true));
        assert_eq!(options.character_data, Some(true));
    }

    #[test]
    fn options_reject_contradictions() {
        for options in [
            MutationObserverInit {
                attributes: Some(false),
                attribute_old_value: Some(true),
                child_list: true,
                ..Default::default()
            },
            MutationObserverInit {
                attributes: Some(false),
                attribute_filter: Some(Vec::new()),
                child_list: true,
                ..Default::default()
            },
            MutationObserverInit {
                character_data: Some(false),
                character_data_old_value: Some(true),
                child_list: true,
                ..Default::default()
            },
        ] {
            assert!(matches!(options.normalized(), Err(Exception::TypeError(_))));
        }
    }

    #[test]
    fn options_from_json() {
        let options: MutationObserverInit =
            serde_json::from_str(r#"{"childList": true, "attributeFilter": ["id"]}"#).unwrap();

        assert!(options.child_list);
        assert!(!options.subtree);
        assert_eq!(options.attributes, None);
        assert_eq!(options.attribute_filter, Some(vec!["id".to_string()]));

        let json = serde_json::to_string(&MutationObserverInit {
            attributes: Some(true),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"childList":false,"attributes":true,"subtree":false}"#);
    }

    #[test]
    fn observe_does_not_modify_caller_options() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let target = Node::new_element("div");
        let options = MutationObserverInit {
            attribute_old_value: Some(true),
            ..Default::default()
        };

        observer.observe(&target, &options).unwrap();

        assert_eq!(options.attributes, None);
        assert_eq!(
            target.registered_observers()[0].options().attributes,
            Some(true)
        );
    }

    #[test]
    fn observing_twice_replaces_the_registration() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let target = Node::new_element("div");

        observer.observe(&target, &child_list()).unwrap();
        observer
            .observe(
                &target,
                &MutationObserverInit {
                    attributes: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(target.registered_observers().len(), 1);
        assert_eq!(observer.nodes().len(), 1);

        target.append_child(&Node::new_element("p")).unwrap();
        assert_eq!(observer.pending_record_count(), 0);

        target.set_attribute("id", "main").unwrap();
        assert_eq!(observer.pending_record_count(), 1);
    }

    #[test]
    fn records_child_list_changes() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let parent = Node::new_element("ul");
        let first = Node::new_element("li");
        let second = Node::new_element("li");
        parent.append_child(&first).unwrap();

        observer.observe(&parent, &child_list()).unwrap();
        parent.append_child(&second).unwrap();
        parent.remove_child(&first).unwrap();

        let records = observer.take_records();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].mutation_type, MutationType::ChildList);
        assert!(Node::are_same(&records[0].target, &parent));
        assert!(Node::are_same(&records[0].added_nodes.item(0).unwrap(), &second));
        assert!(Node::are_same_optional(
            records[0].previous_sibling.as_ref(),
            Some(&first)
        ));
        assert!(records[0].next_sibling.is_none());

        assert!(records[1].added_nodes.is_empty());
        assert!(Node::are_same(&records[1].removed_nodes.item(0).unwrap(), &first));
        assert!(Node::are_same_optional(
            records[1].next_sibling.as_ref(),
            Some(&second)
        ));

        assert!(observer.take_records().is_empty());
    }

    #[test]
    fn subtree_reaches_descendants_only_when_asked() {
        let agent = Agent::new();
        let shallow = silent_observer(&agent);
        let deep = silent_observer(&agent);
        let root = Node::new_element("div");
        let child = Node::new_element("p");
        root.append_child(&child).unwrap();

        shallow.observe(&root, &child_list()).unwrap();
        deep.observe(
            &root,
            &MutationObserverInit {
                child_list: true,
                subtree: true,
                ..Default::default()
            },
        )
        .unwrap();

        child.append_child(&Node::new_text("hi")).unwrap();

        assert_eq!(shallow.pending_record_count(), 0);
        assert_eq!(deep.pending_record_count(), 1);
    }

    #[test]
    fn old_values_only_for_observers_that_ask() {
        let agent = Agent::new();
        let with_old_value = silent_observer(&agent);
        let without_old_value = silent_observer(&agent);
        let element = Node::new_element("div");
        element.set_attribute("class", "a").unwrap();

        with_old_value
            .observe(
                &element,
                &MutationObserverInit {
                    attribute_old_value: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        without_old_value
            .observe(
                &element,
                &MutationObserverInit {
                    attributes: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        element.set_attribute("class", "b").unwrap();

        let records = with_old_value.take_records();
        assert_eq!(records[0].attribute_name.as_deref(), Some("class"));
        assert_eq!(records[0].old_value.as_deref(), Some("a"));
        assert_eq!(without_old_value.take_records()[0].old_value, None);
    }

    #[test]
    fn attribute_filter() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let element = Node::new_element("input");

        observer
            .observe(
                &element,
                &MutationObserverInit {
                    attribute_filter: Some(vec!["value".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();

        element.set_attribute("type", "text").unwrap();
        element.set_attribute("value", "x").unwrap();

        let records = observer.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attribute_name.as_deref(), Some("value"));
    }

    #[test]
    fn character_data_old_value() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let text = Node::new_text("one");

        observer
            .observe(
                &text,
                &MutationObserverInit {
                    character_data_old_value: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        text.set_data("two").unwrap();

        let records = observer.take_records();
        assert_eq!(records[0].mutation_type, MutationType::CharacterData);
        assert_eq!(records[0].old_value.as_deref(), Some("one"));
    }

    #[test]
    fn disconnect_removes_registrations_and_records() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let a = Node::new_element("div");
        let b = Node::new_element("div");

        observer.observe(&a, &child_list()).unwrap();
        observer.observe(&b, &child_list()).unwrap();
        a.append_child(&Node::new_element("p")).unwrap();
        assert_eq!(observer.pending_record_count(), 1);

        observer.disconnect();

        assert!(a.registered_observers().is_empty());
        assert!(b.registered_observers().is_empty());
        assert_eq!(observer.pending_record_count(), 0);

        b.append_child(&Node::new_element("p")).unwrap();
        assert_eq!(observer.pending_record_count(), 0);
    }

    #[test]
    fn removed_nodes_stay_observed_until_delivery() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let agent = Agent::new();
        let observer = {
            let seen = seen.clone();
            MutationObserver::new(
                &agent,
                move |records: &[MutationRecord], _: &MutationObserver| {
                    seen.borrow_mut()
                        .extend(records.iter().map(|record| record.mutation_type));
                },
            )
        };
        let root = Node::new_element("div");
        let child = Node::new_element("p");
        root.append_child(&child).unwrap();

        observer
            .observe(
                &root,
                &MutationObserverInit {
                    subtree: true,
                    attributes: Some(true),
                    child_list: true,
                    ..Default::default()
                },
            )
            .unwrap();

        root.remove_child(&child).unwrap();
        assert!(child.registered_observers()[0].is_transient());

        child.set_attribute("id", "detached").unwrap();
        agent.perform_microtask_checkpoint();

        assert_eq!(
            *seen.borrow(),
            vec![MutationType::ChildList, MutationType::Attributes]
        );
        assert!(child.registered_observers().is_empty());

        child.set_attribute("id", "ignored").unwrap();
        assert_eq!(observer.pending_record_count(), 0);
    }

    #[test]
    fn reobserving_drops_transient_copies() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let root = Node::new_element("div");
        let child = Node::new_element("p");
        root.append_child(&child).unwrap();
        let subtree = MutationObserverInit {
            child_list: true,
            subtree: true,
            ..Default::default()
        };

        observer.observe(&root, &subtree).unwrap();
        root.remove_child(&child).unwrap();
        assert_eq!(child.registered_observers().len(), 1);

        observer.observe(&root, &subtree).unwrap();
        assert!(child.registered_observers().is_empty());
    }

    fn everything_below(observer: &Rc<MutationObserver>, root: &Rc<Node>) {
        observer
            .observe(
                root,
                &MutationObserverInit {
                    child_list: true,
                    attributes: Some(true),
                    subtree: true,
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn moving_a_node_records_removal_then_insertion() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let root = Node::new_element("div");
        let a = Node::new_element("a");
        let b = Node::new_element("b");
        let moving = Node::new_element("span");
        root.append_child(&a).unwrap();
        root.append_child(&b).unwrap();
        a.append_child(&moving).unwrap();
        everything_below(&observer, &root);

        b.append_child(&moving).unwrap();

        let records = observer.take_records();
        assert_eq!(records.len(), 2);

        assert!(Node::are_same(&records[0].target, &a));
        assert!(records[0].added_nodes.is_empty());
        assert!(Node::are_same(&records[0].removed_nodes.item(0).unwrap(), &moving));

        assert!(Node::are_same(&records[1].target, &b));
        assert!(records[1].removed_nodes.is_empty());
        assert!(Node::are_same(&records[1].added_nodes.item(0).unwrap(), &moving));
    }

    #[test]
    fn insert_before_records_both_siblings() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let root = Node::new_element("div");
        let a = Node::new_element("a");
        let b = Node::new_element("b");
        root.append_child(&a).unwrap();
        root.append_child(&b).unwrap();
        observer.observe(&root, &child_list()).unwrap();

        let inserted = Node::new_element("span");
        root.insert_before(&inserted, Some(&b)).unwrap();

        let records = observer.take_records();
        assert_eq!(records.len(), 1);
        assert!(Node::are_same(&records[0].added_nodes.item(0).unwrap(), &inserted));
        assert!(Node::are_same_optional(
            records[0].previous_sibling.as_ref(),
            Some(&a)
        ));
        assert!(Node::are_same_optional(
            records[0].next_sibling.as_ref(),
            Some(&b)
        ));
    }

    #[test]
    fn remove_attribute_records_the_old_value() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let element = Node::new_element("div");
        element.set_attribute("title", "hello").unwrap();
        observer
            .observe(
                &element,
                &MutationObserverInit {
                    attribute_old_value: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        element.remove_attribute("title").unwrap();

        let records = observer.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mutation_type, MutationType::Attributes);
        assert_eq!(records[0].attribute_name.as_deref(), Some("title"));
        assert_eq!(records[0].old_value.as_deref(), Some("hello"));
    }

    #[test]
    fn changes_that_do_not_happen_record_nothing() {
        let agent = Agent::new();
        let observer = silent_observer(&agent);
        let root = Node::new_element("div");
        let child = Node::new_element("p");
        root.append_child(&child).unwrap();
        everything_below(&observer, &root);

        root.remove_attribute("missing").unwrap();
        assert!(root.append_child(&root).is_err());
        assert!(child.append_child(&root).is_err());
        assert!(root
            .insert_before(&Node::new_element("p"), Some(&Node::new_element("q")))
            .is_err());

        assert_eq!(observer.pending_record_count(), 0);
        assert!(!agent.has_pending_microtask());
    }
}
