//! Cache categories and key construction.
//!
//! Keys are opaque strings, unique within a category. Callers build them
//! through the constructors here so the same resource always maps to the
//! same slot.

use std::fmt;

use uuid::Uuid;

/// A named, typed store inside the cache.
///
/// `FolderTree`, `PageFolderTree` and `FolderList` hold collections derived
/// from page data; [`Category::dependents`] encodes which of them go stale
/// when a category is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Individual pages, keyed by id.
    Pages,
    /// Flat folder listings, keyed by locale.
    FolderList,
    /// Folder hierarchies, keyed by locale.
    FolderTree,
    /// Folder hierarchies with page attachments, keyed by locale.
    PageFolderTree,
    /// Latest published platform version.
    Version,
    /// Generic keyed values (registry lookups and other tagged blobs).
    Keyed,
}

impl Category {
    /// Every category, in clear-dispatch order.
    pub const ALL: [Category; 6] = [
        Category::Pages,
        Category::FolderList,
        Category::FolderTree,
        Category::PageFolderTree,
        Category::Version,
        Category::Keyed,
    ];

    /// Categories whose contents are derived from this one.
    ///
    /// Clearing a category also clears each of its dependents. The folder
    /// structures are computed from page data, and page-folder associations
    /// are computed from the folder tree.
    pub fn dependents(self) -> &'static [Category] {
        match self {
            Category::Pages => &[
                Category::FolderTree,
                Category::PageFolderTree,
                Category::FolderList,
            ],
            Category::FolderTree => &[Category::PageFolderTree],
            Category::FolderList
            | Category::PageFolderTree
            | Category::Version
            | Category::Keyed => &[],
        }
    }

    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pages => "pages",
            Category::FolderList => "folder_list",
            Category::FolderTree => "folder_tree",
            Category::PageFolderTree => "page_folder_tree",
            Category::Version => "version",
            Category::Keyed => "keyed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Key constructors
// ============================================================================

/// Key for a page entry.
pub fn page_key(id: Uuid) -> String {
    id.to_string()
}

/// Key for a locale's flat folder listing.
pub fn folder_list_key(locale: &str) -> String {
    format!("list:{locale}")
}

/// Key for a locale's folder hierarchy.
pub fn folder_tree_key(locale: &str) -> String {
    format!("tree:{locale}")
}

/// Key for a locale's folder hierarchy with page attachments.
pub fn page_folder_tree_key(locale: &str) -> String {
    format!("pages:{locale}")
}

/// Key for the latest-version slot.
pub fn latest_version_key() -> String {
    "latest".to_string()
}

/// Key for an external registry lookup, e.g. `pkg:react@latest`.
pub fn module_key(name: &str, tag: &str) -> String {
    format!("pkg:{name}@{tag}")
}
