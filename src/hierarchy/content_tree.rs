//! # Content Tree
//!
//! The hierarchical namespace that owns one storage container per entity.
//! The resolver only talks to the [`ContentTree`] trait; [`FsContentTree`] is
//! a directory-per-container implementation used by the standalone store.
//!
//! # Layout
//! ```text
//! {root}/container.json                 root metadata
//! {root}/blog/container.json            container "blog"
//! {root}/blog/2024-01-counts.csv        its shards
//! {root}/blog/hello-world/container.json
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StatsError};

pub const METADATA_FILE: &str = "container.json";

/// What to create under a parent container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSpec {
    pub slug: String,
    pub title: String,
}

/// A hierarchical store of containers addressed by `/`-separated ids.
pub trait ContentTree {
    type Container: Clone;

    /// Look up the container for `id`, relative to the tree's root.
    fn find_container(&self, id: &str) -> Result<Option<Self::Container>>;

    /// Create a direct child of `parent`. Fails if the child already exists.
    fn create_child(&self, parent: &Self::Container, spec: &ChildSpec) -> Result<Self::Container>;

    /// Mark a container as published and return its updated handle.
    fn publish(&self, container: Self::Container) -> Result<Self::Container>;

    /// Directory where the container's files live.
    fn container_root(&self, container: &Self::Container) -> PathBuf;
}

/// Metadata stored alongside each container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMeta {
    pub slug: String,
    pub title: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// Handle to a container of an [`FsContentTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsContainer {
    /// Id relative to the tree root; empty for the root itself
    pub id: String,
    pub dir: PathBuf,
}

/// Content tree backed by nested directories.
#[derive(Debug, Clone)]
pub struct FsContentTree {
    root_dir: PathBuf,
}

impl FsContentTree {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        FsContentTree {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Open the root container, creating and publishing it on first use.
    pub fn open_root(&self, slug: &str, title: &str) -> Result<FsContainer> {
        let root = FsContainer {
            id: String::new(),
            dir: self.root_dir.clone(),
        };

        if !self.root_dir.join(METADATA_FILE).is_file() {
            fs::create_dir_all(&self.root_dir)
                .map_err(|e| StatsError::storage_create(slug, e))?;
            write_metadata(
                &self.root_dir,
                &ContainerMeta {
                    slug: slug.to_string(),
                    title: title.to_string(),
                    published: true,
                    created_at: Utc::now(),
                },
            )?;
            log::info!("Created stats root at {}", self.root_dir.display());
        }

        Ok(root)
    }

    pub fn metadata(&self, container: &FsContainer) -> Result<ContainerMeta> {
        read_metadata(&container.dir)
    }
}

impl ContentTree for FsContentTree {
    type Container = FsContainer;

    fn find_container(&self, id: &str) -> Result<Option<FsContainer>> {
        let dir = self.root_dir.join(id);
        if dir.join(METADATA_FILE).is_file() {
            Ok(Some(FsContainer {
                id: id.to_string(),
                dir,
            }))
        } else {
            Ok(None)
        }
    }

    fn create_child(&self, parent: &FsContainer, spec: &ChildSpec) -> Result<FsContainer> {
        let id = if parent.id.is_empty() {
            spec.slug.clone()
        } else {
            format!("{}/{}", parent.id, spec.slug)
        };
        let dir = parent.dir.join(&spec.slug);

        if dir.join(METADATA_FILE).exists() {
            return Err(StatsError::storage_create(id, "container already exists"));
        }

        fs::create_dir_all(&dir).map_err(|e| StatsError::storage_create(id.as_str(), e))?;
        write_metadata(
            &dir,
            &ContainerMeta {
                slug: spec.slug.clone(),
                title: spec.title.clone(),
                published: false,
                created_at: Utc::now(),
            },
        )?;

        Ok(FsContainer { id, dir })
    }

    fn publish(&self, container: FsContainer) -> Result<FsContainer> {
        let mut meta = read_metadata(&container.dir)?;
        if !meta.published {
            meta.published = true;
            write_metadata(&container.dir, &meta)?;
        }
        Ok(container)
    }

    fn container_root(&self, container: &FsContainer) -> PathBuf {
        container.dir.clone()
    }
}

fn read_metadata(dir: &Path) -> Result<ContainerMeta> {
    let path = dir.join(METADATA_FILE);
    let raw = fs::read_to_string(&path).map_err(|e| StatsError::io(&path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write metadata through a temp file and rename, so readers never see a
/// half-written file.
fn write_metadata(dir: &Path, meta: &ContainerMeta) -> Result<()> {
    let path = dir.join(METADATA_FILE);
    let tmp_path = path.with_extension("json.tmp");

    let json = serde_json::to_string_pretty(meta)?;
    fs::write(&tmp_path, json).map_err(|e| StatsError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, &path).map_err(|e| StatsError::io(&path, e))?;
    Ok(())
}
