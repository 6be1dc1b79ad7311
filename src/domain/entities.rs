//! Domain records held by the typed cache categories.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: Uuid,
    pub slug: String,
    pub path: String,
    pub title: String,
    pub locale: String,
    pub updated_at: OffsetDateTime,
}

/// One row of the flat folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub path: String,
    pub title: String,
    pub depth: u32,
}

/// A node of the folder hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTreeNode {
    pub path: String,
    pub title: String,
    pub children: Vec<FolderTreeNode>,
}

/// A folder-hierarchy node with the pages attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTreeNode {
    pub path: String,
    pub title: String,
    pub page_id: Option<Uuid>,
    pub children: Vec<PageTreeNode>,
}

/// The latest published platform version, as reported by the release feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub channel: String,
}
