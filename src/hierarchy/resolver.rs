//! # Hierarchy Resolver
//!
//! Maps an entity id such as `blog/2024/hello` to its storage container,
//! creating the container and any missing ancestors first. Ancestors are
//! created from the root downward, so every non-root container always has an
//! existing parent.

use log::info;
use parking_lot::Mutex;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::content_tree::{ChildSpec, ContentTree};
use crate::error::{Result, StatsError};

static ENTITY_ID: OnceLock<Regex> = OnceLock::new();

fn entity_id_pattern() -> &'static Regex {
    ENTITY_ID.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+(/[A-Za-z0-9_-]+)*$").expect("entity id pattern compiles")
    })
}

/// Check that `id` is a non-empty `/`-separated list of slugs.
pub fn validate_entity_id(id: &str) -> Result<()> {
    if entity_id_pattern().is_match(id) {
        Ok(())
    } else {
        Err(StatsError::InvalidEntityId(id.to_string()))
    }
}

/// Ids of every ancestor of `id` followed by `id` itself, root-most first.
pub fn lineage(id: &str) -> Vec<String> {
    let segments: Vec<&str> = id.split('/').collect();
    (1..=segments.len())
        .map(|depth| segments[..depth].join("/"))
        .collect()
}

/// Finds or creates entity containers in a content tree.
pub struct Resolver<T: ContentTree> {
    tree: T,
    root: T::Container,
    /// Serializes container creation within this process
    create_lock: Mutex<()>,
}

impl<T: ContentTree> Resolver<T> {
    /// A resolver creating top-level containers under `root`.
    pub fn new(tree: T, root: T::Container) -> Self {
        Resolver {
            tree,
            root,
            create_lock: Mutex::new(()),
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn root(&self) -> &T::Container {
        &self.root
    }

    /// Existing container for `id`, without creating anything.
    pub fn find(&self, id: &str) -> Result<Option<T::Container>> {
        validate_entity_id(id)?;
        self.tree.find_container(id)
    }

    /// Storage directory of `id`, if its container exists.
    pub fn find_dir(&self, id: &str) -> Result<Option<PathBuf>> {
        Ok(self.find(id)?.map(|c| self.tree.container_root(&c)))
    }

    /// Container for `id`, creating it and its missing ancestors.
    pub fn resolve(&self, id: &str) -> Result<T::Container> {
        validate_entity_id(id)?;

        if let Some(container) = self.tree.find_container(id)? {
            return Ok(container);
        }

        let _guard = self.create_lock.lock();

        let mut parent = self.root.clone();
        for ancestor_id in lineage(id) {
            parent = match self.tree.find_container(&ancestor_id)? {
                Some(existing) => existing,
                None => self.create(&parent, &ancestor_id)?,
            };
        }

        Ok(parent)
    }

    /// Storage directory of `id`, creating its container if needed.
    pub fn resolve_dir(&self, id: &str) -> Result<PathBuf> {
        let container = self.resolve(id)?;
        Ok(self.tree.container_root(&container))
    }

    fn create(&self, parent: &T::Container, id: &str) -> Result<T::Container> {
        let slug = id.rsplit('/').next().unwrap_or(id);
        let spec = ChildSpec {
            slug: slug.to_string(),
            title: slug.to_string(),
        };

        let created = self
            .tree
            .create_child(parent, &spec)
            .map_err(|e| as_storage_create(id, e))?;
        let published = self
            .tree
            .publish(created)
            .map_err(|e| as_storage_create(id, e))?;

        info!("Created stats container {}", id);
        Ok(published)
    }
}

fn as_storage_create(id: &str, error: StatsError) -> StatsError {
    match error {
        StatsError::StorageCreate { .. } => error,
        other => StatsError::storage_create(id, other),
    }
}
