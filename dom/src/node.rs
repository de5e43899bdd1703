use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::idl::{ErrorName, Exception};
use crate::mutation_observer::RegisteredObserver;
use crate::mutation_record::{MutationRecord, MutationType};
use crate::node_list::LiveNodeList;

/// A node in the document tree.
///
/// Nodes are reference counted. A node owns its children and only holds a
/// weak reference to its parent, so dropping the root drops the whole tree.
pub struct Node {
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<Rc<Node>>>,
    registered_observers: RefCell<Vec<Rc<RegisteredObserver>>>,
    pub data: NodeData,
}

impl Node {
    pub fn new(data: NodeData) -> Rc<Node> {
        Rc::new(Node {
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            registered_observers: RefCell::new(Vec::new()),
            data,
        })
    }

    pub fn new_document() -> Rc<Node> {
        Self::new(NodeData::Document)
    }

    pub fn new_element(local_name: &str) -> Rc<Node> {
        Self::new(NodeData::Element {
            local_name: local_name.to_string(),
            attributes: RefCell::new(Vec::new()),
        })
    }

    pub fn new_text(data: &str) -> Rc<Node> {
        Self::new(NodeData::CharacterData {
            data: RefCell::new(data.to_string()),
            variant: CharacterDataVariant::Text,
        })
    }

    pub fn new_comment(data: &str) -> Rc<Node> {
        Self::new(NodeData::CharacterData {
            data: RefCell::new(data.to_string()),
            variant: CharacterDataVariant::Comment,
        })
    }

    pub fn are_same(a: &Rc<Node>, b: &Rc<Node>) -> bool {
        Rc::ptr_eq(a, b)
    }

    pub fn are_same_optional(a: Option<&Rc<Node>>, b: Option<&Rc<Node>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => Node::are_same(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().upgrade()
    }

    pub fn children(&self) -> Ref<'_, Vec<Rc<Node>>> {
        self.children.borrow()
    }

    pub fn first_child(&self) -> Option<Rc<Node>> {
        self.children.borrow().first().cloned()
    }

    pub fn last_child(&self) -> Option<Rc<Node>> {
        self.children.borrow().last().cloned()
    }

    pub fn previous_sibling(&self) -> Option<Rc<Node>> {
        let parent = self.parent()?;
        let index = self.index().checked_sub(1)?;
        let siblings = parent.children.borrow();
        siblings.get(index).cloned()
    }

    pub fn next_sibling(&self) -> Option<Rc<Node>> {
        let parent = self.parent()?;
        let index = self.index() + 1;
        let siblings = parent.children.borrow();
        siblings.get(index).cloned()
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-tree-index
    pub fn index(&self) -> usize {
        match self.parent() {
            Some(parent) => parent
                .children
                .borrow()
                .iter()
                .position(|child| std::ptr::eq(Rc::as_ptr(child), self))
                .unwrap_or(0),
            None => 0,
        }
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-tree-inclusive-ancestor
    pub fn inclusive_ancestors(self: &Rc<Self>) -> Vec<Rc<Node>> {
        let mut nodes = vec![self.clone()];
        let mut current = self.parent();
        while let Some(ancestor) = current {
            current = ancestor.parent();
            nodes.push(ancestor);
        }
        nodes
    }

    pub fn is_inclusive_ancestor_of(self: &Rc<Self>, other: &Rc<Node>) -> bool {
        other
            .inclusive_ancestors()
            .iter()
            .any(|ancestor| Node::are_same(ancestor, self))
    }

    /// Visits this node and all of its descendants in tree order.
    ///
    /// The walk keeps its own stack, so the depth of the tree is not limited by
    /// the thread's stack size.
    pub fn for_each_in_inclusive_subtree<F: FnMut(&Rc<Node>)>(self: &Rc<Self>, mut f: F) {
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            f(&node);
            stack.extend(node.children.borrow().iter().rev().cloned());
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self.data, NodeData::Document)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    pub fn is_character_data(&self) -> bool {
        matches!(self.data, NodeData::CharacterData { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self.data,
            NodeData::CharacterData {
                variant: CharacterDataVariant::Text,
                ..
            }
        )
    }

    pub fn is_comment(&self) -> bool {
        matches!(
            self.data,
            NodeData::CharacterData {
                variant: CharacterDataVariant::Comment,
                ..
            }
        )
    }

    pub fn element_tag_name(&self) -> Option<&str> {
        if let NodeData::Element { local_name, .. } = &self.data {
            return Some(local_name);
        }
        None
    }

    pub fn registered_observers(&self) -> Ref<'_, Vec<Rc<RegisteredObserver>>> {
        self.registered_observers.borrow()
    }

    pub(crate) fn append_registered_observer(&self, registered: Rc<RegisteredObserver>) {
        self.registered_observers.borrow_mut().push(registered);
    }

    pub(crate) fn retain_registered_observers<F>(&self, f: F)
    where
        F: FnMut(&Rc<RegisteredObserver>) -> bool,
    {
        self.registered_observers.borrow_mut().retain(f);
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-node-childnodes
    pub fn child_nodes(self: &Rc<Self>) -> LiveNodeList {
        let root = Rc::downgrade(self);
        LiveNodeList::new(self.clone(), move |node: &Rc<Node>| {
            node.parent.borrow().ptr_eq(&root)
        })
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-getelementsbytagname
    pub fn get_elements_by_tag_name(self: &Rc<Self>, qualified_name: &str) -> LiveNodeList {
        let root = Rc::downgrade(self);
        let qualified_name = qualified_name.to_string();
        LiveNodeList::new(self.clone(), move |node: &Rc<Node>| {
            if std::ptr::eq(Rc::as_ptr(node), root.as_ptr()) {
                return false;
            }
            match node.element_tag_name() {
                Some(tag) => qualified_name == "*" || tag == qualified_name,
                None => false,
            }
        })
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.data {
            NodeData::Element { attributes, .. } => attributes
                .borrow()
                .iter()
                .find(|attribute| attribute.name == name)
                .map(|attribute| attribute.value.clone()),
            _ => None,
        }
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-element-setattribute
    pub fn set_attribute(self: &Rc<Self>, name: &str, value: &str) -> Result<(), Exception> {
        let NodeData::Element { attributes, .. } = &self.data else {
            return Err(Exception::TypeError(
                "setAttribute called on a non-element node",
            ));
        };

        // 1. If qualifiedName is not a valid attribute local name,
        //    then throw an "InvalidCharacterError" DOMException.
        if !is_valid_attribute_local_name(name) {
            return Err(ErrorName::InvalidCharacterError.into());
        }

        let old_value = self.get_attribute(name);

        // SPECLINK: https://dom.spec.whatwg.org/#concept-element-attributes-change
        // SPECLINK: https://dom.spec.whatwg.org/#concept-element-attributes-append
        MutationRecord::queue_mutation_record(
            self,
            MutationType::Attributes,
            Some(name),
            None,
            old_value,
            Vec::new(),
            Vec::new(),
            None,
            None,
        );

        let mut attributes = attributes.borrow_mut();
        match attributes.iter_mut().find(|attribute| attribute.name == name) {
            Some(attribute) => attribute.value = value.to_string(),
            None => attributes.push(Attribute {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-element-removeattribute
    pub fn remove_attribute(self: &Rc<Self>, name: &str) -> Result<(), Exception> {
        let NodeData::Element { attributes, .. } = &self.data else {
            return Err(Exception::TypeError(
                "removeAttribute called on a non-element node",
            ));
        };

        let Some(old_value) = self.get_attribute(name) else {
            return Ok(());
        };

        // SPECLINK: https://dom.spec.whatwg.org/#concept-element-attributes-remove
        MutationRecord::queue_mutation_record(
            self,
            MutationType::Attributes,
            Some(name),
            None,
            Some(old_value),
            Vec::new(),
            Vec::new(),
            None,
            None,
        );

        let mut attributes = attributes.borrow_mut();
        attributes.retain(|attribute| attribute.name != name);
        Ok(())
    }

    pub fn data(&self) -> Option<String> {
        match &self.data {
            NodeData::CharacterData { data, .. } => Some(data.borrow().clone()),
            _ => None,
        }
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-cd-replace
    pub fn set_data(self: &Rc<Self>, new_data: &str) -> Result<(), Exception> {
        let NodeData::CharacterData { data, .. } = &self.data else {
            return Err(Exception::TypeError(
                "data set on a non-character-data node",
            ));
        };

        let old_value = data.borrow().clone();

        // 4. Queue a mutation record of "characterData" for node with
        //    null, null, node's data, « », « », null, and null.
        MutationRecord::queue_mutation_record(
            self,
            MutationType::CharacterData,
            None,
            None,
            Some(old_value),
            Vec::new(),
            Vec::new(),
            None,
            None,
        );

        *data.borrow_mut() = new_data.to_string();
        Ok(())
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-node-ensure-pre-insertion-validity
    pub fn ensure_pre_insertion_validity(
        self: &Rc<Self>,
        node: &Rc<Node>,
        child: Option<&Rc<Node>>,
    ) -> Result<(), Exception> {
        // 1. If parent is not a Document, DocumentFragment, or Element node,
        //    then throw a "HierarchyRequestError" DOMException.
        if !self.is_document() && !self.is_element() {
            return Err(ErrorName::HierarchyRequestError.into());
        }

        // 2. If node is a host-including inclusive ancestor of parent,
        //    then throw a "HierarchyRequestError" DOMException.
        if node.is_inclusive_ancestor_of(self) {
            return Err(ErrorName::HierarchyRequestError.into());
        }

        // 3. If child is non-null and its parent is not parent,
        //    then throw a "NotFoundError" DOMException.
        if let Some(child) = child {
            if !Node::are_same_optional(child.parent().as_ref(), Some(self)) {
                return Err(ErrorName::NotFoundError.into());
            }
        }

        // 4. If node is not a DocumentFragment, DocumentType, Element, or CharacterData node,
        //    then throw a "HierarchyRequestError" DOMException.
        if !node.is_element() && !node.is_character_data() {
            return Err(ErrorName::HierarchyRequestError.into());
        }

        // 5. If either node is a Text node and parent is a document,
        //    then throw a "HierarchyRequestError" DOMException.
        if node.is_text() && self.is_document() {
            return Err(ErrorName::HierarchyRequestError.into());
        }

        // 6. If parent is a document, node is an element and parent has an element child,
        //    then throw a "HierarchyRequestError" DOMException.
        if self.is_document()
            && node.is_element()
            && self.children().iter().any(|child| child.is_element())
        {
            return Err(ErrorName::HierarchyRequestError.into());
        }

        Ok(())
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-node-appendchild
    pub fn append_child(self: &Rc<Self>, node: &Rc<Node>) -> Result<Rc<Node>, Exception> {
        self.pre_insert(node, None)
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-node-insertbefore
    pub fn insert_before(
        self: &Rc<Self>,
        node: &Rc<Node>,
        child: Option<&Rc<Node>>,
    ) -> Result<Rc<Node>, Exception> {
        self.pre_insert(node, child)
    }

    // SPECLINK: https://dom.spec.whatwg.org/#dom-node-removechild
    pub fn remove_child(self: &Rc<Self>, child: &Rc<Node>) -> Result<Rc<Node>, Exception> {
        // 1. If child's parent is not parent, then throw a "NotFoundError" DOMException.
        if !Node::are_same_optional(child.parent().as_ref(), Some(self)) {
            return Err(ErrorName::NotFoundError.into());
        }

        // 2. Remove child.
        self.remove(child);

        // 3. Return child.
        Ok(child.clone())
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-node-pre-insert
    fn pre_insert(
        self: &Rc<Self>,
        node: &Rc<Node>,
        child: Option<&Rc<Node>>,
    ) -> Result<Rc<Node>, Exception> {
        // 1. Ensure pre-insertion validity of node into parent before child.
        self.ensure_pre_insertion_validity(node, child)?;

        // 2. Let referenceChild be child.
        let mut reference_child = child.cloned();

        // 3. If referenceChild is node, then set referenceChild to node's next sibling.
        if Node::are_same_optional(reference_child.as_ref(), Some(node)) {
            reference_child = node.next_sibling();
        }

        // 4. Insert node into parent before referenceChild.
        self.insert(node, reference_child.as_ref());

        // 5. Return node.
        Ok(node.clone())
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-node-insert
    fn insert(self: &Rc<Self>, node: &Rc<Node>, child: Option<&Rc<Node>>) {
        // Adopting a node that still has a parent removes it from that parent first.
        if let Some(old_parent) = node.parent() {
            old_parent.remove(node);
        }

        // 6. Let previousSibling be child's previous sibling or parent's last child if child is null.
        let previous_sibling = match child {
            Some(child) => child.previous_sibling(),
            None => self.last_child(),
        };

        // 7.2. If child is null, then append node to parent's children.
        // 7.3. Otherwise, insert node into parent's children before child's index.
        match child {
            Some(child) => {
                let index = child.index();
                self.children.borrow_mut().insert(index, node.clone());
            }
            None => self.children.borrow_mut().push(node.clone()),
        }
        *node.parent.borrow_mut() = Rc::downgrade(self);

        // 8. If suppress observers flag is unset, then queue a tree mutation record for parent
        //    with nodes, « », previousSibling, and child.
        MutationRecord::queue_tree_mutation_record(
            self,
            vec![node.clone()],
            Vec::new(),
            previous_sibling,
            child.cloned(),
        );
    }

    // SPECLINK: https://dom.spec.whatwg.org/#concept-node-remove
    fn remove(self: &Rc<Self>, node: &Rc<Node>) {
        // 4. Let index be node's index.
        let index = node.index();

        // 9. Let oldPreviousSibling be node's previous sibling.
        let old_previous_sibling = node.previous_sibling();

        // 10. Let oldNextSibling be node's next sibling.
        let old_next_sibling = node.next_sibling();

        // 11. Remove node from its parent's children.
        self.children.borrow_mut().remove(index);
        *node.parent.borrow_mut() = Weak::new();

        // 15. For each inclusive ancestor ancestor of parent, then for each registered of
        //     ancestor's registered observer list, if registered's options["subtree"] is true,
        //     then append a new transient registered observer whose observer is registered's
        //     observer, options is registered's options, and source is registered to node's
        //     registered observer list.
        for ancestor in self.inclusive_ancestors() {
            let registered_observers = ancestor.registered_observers.borrow().clone();
            for registered in registered_observers.iter() {
                if !registered.options().subtree {
                    continue;
                }
                node.append_registered_observer(Rc::new(RegisteredObserver::new_transient(
                    registered,
                )));
                registered.observer().append_to_node_list(node);
            }
        }

        // 20. If suppress observers flag is unset, then queue a tree mutation record for parent
        //     with « », « node », oldPreviousSibling, and oldNextSibling.
        MutationRecord::queue_tree_mutation_record(
            self,
            Vec::new(),
            vec![node.clone()],
            old_previous_sibling,
            old_next_sibling,
        );
    }
}

// SPECLINK: https://dom.spec.whatwg.org/#valid-attribute-local-name
fn is_valid_attribute_local_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_ascii_whitespace() || matches!(c, '\0' | '/' | '>' | '='))
}

// The derived drop would recurse once per tree level. Children that this node
// solely owns are detached here and released one at a time instead.
impl Drop for Node {
    fn drop(&mut self) {
        let mut orphans = std::mem::take(self.children.get_mut());
        while let Some(child) = orphans.pop() {
            if let Ok(mut child) = Rc::try_unwrap(child) {
                orphans.append(child.children.get_mut());
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // destructuring will make it fail to compile
        // if you later add a field and forget to update here
        let Node {
            parent,
            children,
            registered_observers,
            data,
        } = self;

        f.debug_struct("Node")
            .field("data", &data)
            .field("children", &children.borrow())
            .field(
                "parent",
                &parent.borrow().upgrade().map(|v| v.data.to_string()),
            )
            .field("registered_observers", &registered_observers.borrow().len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug)]
pub enum NodeData {
    Document,
    Element {
        local_name: String,
        attributes: RefCell<Vec<Attribute>>,
    },
    CharacterData {
        data: RefCell<String>,
        variant: CharacterDataVariant,
    },
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum CharacterDataVariant {
    Text,
    Comment,
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeData::Document => write!(f, "Document"),
            NodeData::Element { local_name, .. } => write!(f, "Element({local_name})"),
            NodeData::CharacterData { variant, .. } => match variant {
                CharacterDataVariant::Text => write!(f, "Text"),
                CharacterDataVariant::Comment => write!(f, "Comment"),
            },
        }
    }
}
