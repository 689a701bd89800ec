//! Entity hierarchy.
//!
//! Entities are identified by `/`-separated paths and each owns one container
//! in a content tree. The resolver creates containers on demand, parents first.

pub mod content_tree;
pub mod resolver;

pub use content_tree::{ChildSpec, ContainerMeta, ContentTree, FsContainer, FsContentTree};
pub use resolver::{lineage, validate_entity_id, Resolver};
