//! Branchable turn history
//!
//! The timeline is an arena of immutable nodes keyed by `NodeId`. Each node
//! points at its parent; the children index lives beside the arena so
//! traversal stays iterative and the whole forest serializes as a flat list.

pub mod document;
pub mod forest;
pub mod node;

pub use document::{
    ArchiveRecord, NodeRecord, RestoredSession, ScenarioMeta, StateRecord, TimelineDocument,
    FORMAT_VERSION,
};
pub use forest::{Ancestors, SupersededTimeline, Timeline};
pub use node::TimelineNode;
