use std::rc::Rc;

use dom::{LiveNodeList, Node, NodeList};

/// What a [`MultiObserver`](crate::MultiObserver) registers when asked to observe.
#[derive(Debug, Clone)]
pub enum ObservationTarget {
    Node(Rc<Node>),
    /// A fixed sequence, registered front to back.
    Nodes(Vec<Rc<Node>>),
    /// A live collection, read at the moment `observe` runs.
    NodeList(LiveNodeList),
}

impl From<Rc<Node>> for ObservationTarget {
    fn from(value: Rc<Node>) -> Self {
        ObservationTarget::Node(value)
    }
}

impl From<&Rc<Node>> for ObservationTarget {
    fn from(value: &Rc<Node>) -> Self {
        ObservationTarget::Node(value.clone())
    }
}

impl From<Vec<Rc<Node>>> for ObservationTarget {
    fn from(value: Vec<Rc<Node>>) -> Self {
        ObservationTarget::Nodes(value)
    }
}

impl From<&[Rc<Node>]> for ObservationTarget {
    fn from(value: &[Rc<Node>]) -> Self {
        ObservationTarget::Nodes(value.to_vec())
    }
}

impl<const N: usize> From<[Rc<Node>; N]> for ObservationTarget {
    fn from(value: [Rc<Node>; N]) -> Self {
        ObservationTarget::Nodes(value.into())
    }
}

impl From<NodeList> for ObservationTarget {
    fn from(value: NodeList) -> Self {
        ObservationTarget::Nodes(value.into())
    }
}

impl From<LiveNodeList> for ObservationTarget {
    fn from(value: LiveNodeList) -> Self {
        ObservationTarget::NodeList(value)
    }
}
