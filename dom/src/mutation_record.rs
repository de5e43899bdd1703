use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::mutation_observer::MutationObserver;
use crate::node::Node;
use crate::node_list::NodeList;

// SPECLINK: https://dom.spec.whatwg.org/#interface-mutationrecord
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: Rc<Node>,
    pub added_nodes: NodeList,
    pub removed_nodes: NodeList,
    pub previous_sibling: Option<Rc<Node>>,
    pub next_sibling: Option<Rc<Node>>,
    pub attribute_name: Option<String>,
    pub attribute_namespace: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    // SPECLINK: https://dom.spec.whatwg.org/#queue-a-tree-mutation-record
    pub(crate) fn queue_tree_mutation_record(
        target: &Rc<Node>,
        added_nodes: Vec<Rc<Node>>,
        removed_nodes: Vec<Rc<Node>>,
        previous_sibling: Option<Rc<Node>>,
        next_sibling: Option<Rc<Node>>,
    ) {
        // 1. Assert: either addedNodes or removedNodes is not empty.
        debug_assert!(!(added_nodes.is_empty() && removed_nodes.is_empty()));

        // 2. Queue a mutation record of "childList" for target with
        //    null, null, null, addedNodes, removedNodes, previousSibling, and nextSibling.
        Self::queue_mutation_record(
            target,
            MutationType::ChildList,
            None,
            None,
            None,
            added_nodes,
            removed_nodes,
            previous_sibling,
            next_sibling,
        );
    }

    // SPECLINK: https://dom.spec.whatwg.org/#queue-a-mutation-record
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn queue_mutation_record(
        target: &Rc<Node>,
        mutation_type: MutationType,
        name: Option<&str>,
        namespace: Option<&str>,
        old_value: Option<String>,
        added_nodes: Vec<Rc<Node>>,
        removed_nodes: Vec<Rc<Node>>,
        previous_sibling: Option<Rc<Node>>,
        next_sibling: Option<Rc<Node>>,
    ) {
        // 1. Let interestedObservers be an empty map.
        let mut interested_observers: Vec<(Rc<MutationObserver>, Option<String>)> = Vec::new();

        // 2. Let nodes be the inclusive ancestors of target.
        let nodes = target.inclusive_ancestors();

        // 3. For each node in nodes, and then for each registered of node's registered observer list:
        for node in nodes.iter() {
            for registered in node.registered_observers().iter() {
                // 3.1. Let options be registered's options.
                let options = registered.options();

                // 3.2. If none of the following are true
                //      - node is not target and options["subtree"] is false
                //      - type is "attributes" and options["attributes"] either does not exist or is false
                //      - type is "attributes", options["attributeFilter"] exists, and options["attributeFilter"]
                //        does not contain name or namespace is non-null
                //      - type is "characterData" and options["characterData"] either does not exist or is false
                //      - type is "childList" and options["childList"] is false
                let attribute_filtered = options
                    .attribute_filter
                    .as_ref()
                    .is_some_and(|filter| {
                        namespace.is_some()
                            || !name.is_some_and(|name| filter.iter().any(|f| f == name))
                    });
                if (!Node::are_same(node, target) && !options.subtree)
                    || (mutation_type == MutationType::Attributes
                        && options.attributes != Some(true))
                    || (mutation_type == MutationType::Attributes && attribute_filtered)
                    || (mutation_type == MutationType::CharacterData
                        && options.character_data != Some(true))
                    || (mutation_type == MutationType::ChildList && !options.child_list)
                {
                    continue;
                }

                // 3.2.1. Let mo be registered's observer.
                let observer = registered.observer();

                // 3.2.2. If interestedObservers[mo] does not exist, then set interestedObservers[mo] to null.
                let index = match interested_observers
                    .iter()
                    .position(|(interested, _)| Rc::ptr_eq(interested, observer))
                {
                    Some(index) => index,
                    None => {
                        interested_observers.push((observer.clone(), None));
                        interested_observers.len() - 1
                    }
                };

                // 3.2.3. If either type is "attributes" and options["attributeOldValue"] is true,
                //        or type is "characterData" and options["characterDataOldValue"] is true,
                //        then set interestedObservers[mo] to oldValue.
                if (mutation_type == MutationType::Attributes
                    && options.attribute_old_value == Some(true))
                    || (mutation_type == MutationType::CharacterData
                        && options.character_data_old_value == Some(true))
                {
                    interested_observers[index].1 = old_value.clone();
                }
            }
        }

        trace!(
            %mutation_type,
            node = %target.data,
            observers = interested_observers.len(),
            "queueing mutation record"
        );

        // 4. For each observer → mappedOldValue of interestedObservers:
        for (observer, mapped_old_value) in interested_observers {
            // 4.1. Let record be a new MutationRecord object with its type set to type, target set to
            //      target, attributeName set to name, attributeNamespace set to namespace, oldValue
            //      set to mappedOldValue, addedNodes set to addedNodes, removedNodes set to
            //      removedNodes, previousSibling set to previousSibling, and nextSibling set to
            //      nextSibling.
            let record = MutationRecord {
                mutation_type,
                target: target.clone(),
                added_nodes: NodeList::new(added_nodes.clone()),
                removed_nodes: NodeList::new(removed_nodes.clone()),
                previous_sibling: previous_sibling.clone(),
                next_sibling: next_sibling.clone(),
                attribute_name: name.map(str::to_string),
                attribute_namespace: namespace.map(str::to_string),
                old_value: mapped_old_value,
            };

            // 4.2. Enqueue record to observer's record queue.
            // 4.3. Append observer to the surrounding agent's pending mutation observers.
            // 5.   Queue a mutation observer microtask.
            observer.enqueue_record(record);
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

impl MutationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationType::Attributes => "attributes",
            MutationType::CharacterData => "characterData",
            MutationType::ChildList => "childList",
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
