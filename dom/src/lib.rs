//! A small reference-counted DOM with mutation observers.
//!
//! The tree operations queue [`MutationRecord`]s for every interested
//! [`MutationObserver`]; an [`Agent`] delivers them at its microtask checkpoint.

pub mod agent;
pub mod idl;
pub mod mutation_observer;
pub mod mutation_record;
pub mod node;
pub mod node_list;

pub use agent::Agent;
pub use idl::{DomException, ErrorName, Exception};
pub use mutation_observer::{
    MutationCallback, MutationObserver, MutationObserverInit, RegisteredObserver,
};
pub use mutation_record::{MutationRecord, MutationType};
pub use node::{Attribute, CharacterDataVariant, Node, NodeData};
pub use node_list::{LiveNodeList, NodeList};
