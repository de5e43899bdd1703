use std::fmt;
use std::rc::Rc;

use crate::node::Node;

// SPECLINK: https://dom.spec.whatwg.org/#interface-nodelist
/// A static collection of nodes, such as the added or removed nodes of a record.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    nodes: Vec<Rc<Node>>,
}

impl NodeList {
    pub fn new(nodes: Vec<Rc<Node>>) -> Self {
        Self { nodes }
    }

    pub fn length(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<Rc<Node>> {
        self.nodes.get(index).cloned()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rc<Node>> {
        self.nodes.iter()
    }

    pub fn to_vec(&self) -> Vec<Rc<Node>> {
        self.nodes.clone()
    }
}

impl From<Vec<Rc<Node>>> for NodeList {
    fn from(value: Vec<Rc<Node>>) -> Self {
        NodeList::new(value)
    }
}

impl From<NodeList> for Vec<Rc<Node>> {
    fn from(value: NodeList) -> Self {
        value.nodes
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Rc<Node>;
    type IntoIter = std::slice::Iter<'a, Rc<Node>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// A live view of the subtree rooted at `root`, containing only the nodes that
/// match `filter`, in tree order.
///
/// Nothing is cached: every access walks the tree as it is at that moment.
#[derive(Clone)]
pub struct LiveNodeList {
    root: Rc<Node>,
    filter: Rc<dyn Fn(&Rc<Node>) -> bool>,
}

// If a collection is live, then the attributes and methods on that object must operate on the
// actual underlying data, not a snapshot of the data.
// When a collection is created, a filter and a root are associated with it.
impl LiveNodeList {
    pub fn new<F: Fn(&Rc<Node>) -> bool + 'static>(root: Rc<Node>, filter: F) -> Self {
        Self {
            root,
            filter: Rc::new(filter),
        }
    }

    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    // The length attribute must return the number of nodes represented by the collection.
    pub fn length(&self) -> usize {
        self.collection().len()
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    // The item(index) method must return the indexth node in the collection.
    // If there is no indexth node in the collection, then the method must return null.
    pub fn item(&self, index: usize) -> Option<Rc<Node>> {
        self.collection().get(index).cloned()
    }

    /// The nodes the collection represents right now.
    pub fn nodes(&self) -> Vec<Rc<Node>> {
        self.collection()
    }

    fn collection(&self) -> Vec<Rc<Node>> {
        let mut nodes = Vec::<Rc<Node>>::new();
        self.root.for_each_in_inclusive_subtree(|node: &Rc<Node>| {
            if (self.filter)(node) {
                nodes.push(node.clone());
            }
        });

        nodes
    }
}

impl From<LiveNodeList> for Vec<Rc<Node>> {
    fn from(value: LiveNodeList) -> Self {
        value.collection()
    }
}

impl From<&LiveNodeList> for NodeList {
    fn from(value: &LiveNodeList) -> Self {
        NodeList::new(value.collection())
    }
}

impl fmt::Debug for LiveNodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveNodeList")
            .field("root", &self.root.data.to_string())
            .field("length", &self.length())
            .finish()
    }
}
