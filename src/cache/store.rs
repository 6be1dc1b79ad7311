//! Typed category stores.
//!
//! One [`MemoMap`] per named category, plus a generic keyed map for
//! arbitrary tagged JSON values. Categories never evict on their own;
//! entries leave only through the clear surface.

use serde_json::Value;

use crate::domain::entities::{
    FolderRecord, FolderTreeNode, PageRecord, PageTreeNode, VersionInfo,
};

use super::keys::Category;
use super::memo::{CacheStatus, MemoMap};

/// The cache's storage: six typed maps, one per [`Category`].
///
/// Constructed once per application context and shared behind an `Arc`;
/// never accessed as an ambient global.
pub struct CacheStore<E> {
    pages: MemoMap<PageRecord, E>,
    folder_list: MemoMap<Vec<FolderRecord>, E>,
    folder_tree: MemoMap<Vec<FolderTreeNode>, E>,
    page_folder_tree: MemoMap<Vec<PageTreeNode>, E>,
    version: MemoMap<VersionInfo, E>,
    keyed: MemoMap<Value, E>,
}

impl<E> CacheStore<E>
where
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pages: MemoMap::new(Category::Pages.as_str()),
            folder_list: MemoMap::new(Category::FolderList.as_str()),
            folder_tree: MemoMap::new(Category::FolderTree.as_str()),
            page_folder_tree: MemoMap::new(Category::PageFolderTree.as_str()),
            version: MemoMap::new(Category::Version.as_str()),
            keyed: MemoMap::new(Category::Keyed.as_str()),
        }
    }

    // ========================================================================
    // Category accessors
    // ========================================================================

    pub fn pages(&self) -> &MemoMap<PageRecord, E> {
        &self.pages
    }

    pub fn folder_list(&self) -> &MemoMap<Vec<FolderRecord>, E> {
        &self.folder_list
    }

    pub fn folder_tree(&self) -> &MemoMap<Vec<FolderTreeNode>, E> {
        &self.folder_tree
    }

    pub fn page_folder_tree(&self) -> &MemoMap<Vec<PageTreeNode>, E> {
        &self.page_folder_tree
    }

    pub fn version(&self) -> &MemoMap<VersionInfo, E> {
        &self.version
    }

    pub fn keyed(&self) -> &MemoMap<Value, E> {
        &self.keyed
    }

    // ========================================================================
    // Category-dispatched operations
    // ========================================================================

    /// Remove every entry in `category`. Returns the removal count.
    pub fn clear_category(&self, category: Category) -> usize {
        match category {
            Category::Pages => self.pages.clear(),
            Category::FolderList => self.folder_list.clear(),
            Category::FolderTree => self.folder_tree.clear(),
            Category::PageFolderTree => self.page_folder_tree.clear(),
            Category::Version => self.version.clear(),
            Category::Keyed => self.keyed.clear(),
        }
    }

    /// Remove, across every category, each entry carrying `tag`.
    pub fn clear_tagged(&self, tag: &str) -> usize {
        self.pages.remove_tagged(tag)
            + self.folder_list.remove_tagged(tag)
            + self.folder_tree.remove_tagged(tag)
            + self.page_folder_tree.remove_tagged(tag)
            + self.version.remove_tagged(tag)
            + self.keyed.remove_tagged(tag)
    }

    /// Freshness of `key` in `category`.
    pub fn status(&self, category: Category, key: &str) -> Option<CacheStatus> {
        match category {
            Category::Pages => self.pages.status(key),
            Category::FolderList => self.folder_list.status(key),
            Category::FolderTree => self.folder_tree.status(key),
            Category::PageFolderTree => self.page_folder_tree.status(key),
            Category::Version => self.version.status(key),
            Category::Keyed => self.keyed.status(key),
        }
    }

    /// Number of settled entries in `category`.
    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Pages => self.pages.len(),
            Category::FolderList => self.folder_list.len(),
            Category::FolderTree => self.folder_tree.len(),
            Category::PageFolderTree => self.page_folder_tree.len(),
            Category::Version => self.version.len(),
            Category::Keyed => self.keyed.len(),
        }
    }

    /// True when every category is empty.
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|category| self.len(*category) == 0)
    }
}

impl<E> Default for CacheStore<E>
where
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use thiserror::Error;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Error)]
    #[error("repository unavailable")]
    struct RepoError;

    fn sample_page(slug: &str) -> PageRecord {
        PageRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            path: format!("/{slug}"),
            title: slug.to_string(),
            locale: "en".to_string(),
            updated_at: time::OffsetDateTime::now_utc(),
        }
    }

    async fn seed_page(store: &CacheStore<RepoError>, slug: &str) -> PageRecord {
        let page = sample_page(slug);
        let stored = page.clone();
        store
            .pages()
            .memoize(&page.id.to_string(), HashSet::new(), async move {
                Ok(stored)
            })
            .await
            .expect("seed page");
        page
    }

    #[tokio::test]
    async fn categories_are_isolated() {
        let store: CacheStore<RepoError> = CacheStore::new();
        seed_page(&store, "home").await;

        assert_eq!(store.len(Category::Pages), 1);
        assert_eq!(store.len(Category::FolderTree), 0);
        assert!(!store.is_empty());

        store.clear_category(Category::FolderTree);
        assert_eq!(store.len(Category::Pages), 1);
    }

    #[tokio::test]
    async fn clear_category_reports_removal_count() {
        let store: CacheStore<RepoError> = CacheStore::new();
        seed_page(&store, "a").await;
        seed_page(&store, "b").await;

        assert_eq!(store.clear_category(Category::Pages), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clear_tagged_spans_categories() {
        let store: CacheStore<RepoError> = CacheStore::new();
        let tags: HashSet<String> = ["npm".to_string()].into();

        store
            .keyed()
            .memoize("pkg:left-pad@latest", tags.clone(), async {
                Ok(serde_json::json!({ "version": "1.3.0" }))
            })
            .await
            .expect("seed keyed");
        store
            .version()
            .memoize("latest", tags, async {
                Ok(VersionInfo {
                    version: "2.5.0".to_string(),
                    channel: "stable".to_string(),
                })
            })
            .await
            .expect("seed version");

        assert_eq!(store.clear_tagged("npm"), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn status_dispatches_by_category() {
        let store: CacheStore<RepoError> = CacheStore::new();
        let page = seed_page(&store, "about").await;

        assert!(
            store
                .status(Category::Pages, &page.id.to_string())
                .is_some()
        );
        assert!(
            store
                .status(Category::Keyed, &page.id.to_string())
                .is_none()
        );
    }
}
