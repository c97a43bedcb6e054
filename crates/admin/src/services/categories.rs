//! Category tree: categories, the selected category and its subcategories.
//!
//! Categories are followed for as long as the tree lives. Subcategories are
//! followed for the selected category only; changing the selection tears
//! the old subcategory listener down before the new one is installed.
//!
//! When a categories snapshot arrives while nothing is selected, the first
//! category is selected. The tree never goes back to having no selection,
//! even if the selected category is deleted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use gem_catalog_core::{CategoryId, RequiredName, SubcategoryId};

use crate::config::CategoryDeletePolicy;
use crate::error::{AppError, ValidationError};
use crate::mirror::LiveMirror;
use crate::models::{
    CATEGORIES_COLLECTION, Category, NameFields, Placement, SUBCATEGORIES_COLLECTION, Subcategory,
};
use crate::notices::Notifier;
use crate::services::catalog::products_collection;
use crate::store::{CollectionPath, DocumentPath, DocumentStore, Query, StoreError, to_fields};

struct TreeInner {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    policy: CategoryDeletePolicy,
    categories: LiveMirror<Category>,
    subcategories: LiveMirror<Subcategory>,
    /// Guards the selection together with the subcategory listener swap.
    selected: Mutex<Option<CategoryId>>,
    selection_tx: watch::Sender<Option<CategoryId>>,
}

/// Two-level category hierarchy with a selected category.
///
/// Cloning is cheap; clones share the same listeners and selection.
#[derive(Clone)]
pub struct CategoryTree {
    inner: Arc<TreeInner>,
}

impl std::fmt::Debug for CategoryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryTree")
            .field("policy", &self.inner.policy)
            .field("categories", &self.inner.categories)
            .field("selected", &self.selected_category())
            .field("subcategories", &self.inner.subcategories)
            .finish_non_exhaustive()
    }
}

fn categories_collection() -> CollectionPath {
    CollectionPath::root(CATEGORIES_COLLECTION)
}

fn category_doc(id: &CategoryId) -> DocumentPath {
    categories_collection().doc(id)
}

fn subcategories_of(category: &CategoryId) -> CollectionPath {
    category_doc(category).subcollection(SUBCATEGORIES_COLLECTION)
}

impl TreeInner {
    fn selection(&self) -> MutexGuard<'_, Option<CategoryId>> {
        self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the subcategory listener to `id` while holding the selection.
    fn switch_to(
        &self,
        selected: &mut Option<CategoryId>,
        id: CategoryId,
    ) -> Result<(), StoreError> {
        let listener = self
            .store
            .listen(Query::collection(subcategories_of(&id)))?;
        self.subcategories.attach(listener, None);
        debug!(category_id = %id, "Selected category");
        *selected = Some(id.clone());
        self.selection_tx.send_replace(Some(id));
        Ok(())
    }

    /// Select the first category if nothing is selected yet.
    fn select_default(&self, categories: &[Category]) {
        let Some(first) = categories.first() else {
            return;
        };
        let mut selected = self.selection();
        if selected.is_some() {
            return;
        }
        if let Err(e) = self.switch_to(&mut selected, first.id.clone()) {
            error!(error = %e, category_id = %first.id, "Failed to select default category");
        }
    }
}

impl CategoryTree {
    /// Create the tree and start following categories.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the categories listener cannot start.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Notifier,
        policy: CategoryDeletePolicy,
    ) -> Result<Self, AppError> {
        let (selection_tx, _) = watch::channel(None);
        let inner = Arc::new(TreeInner {
            store,
            notifier,
            policy,
            categories: LiveMirror::new("categories"),
            subcategories: LiveMirror::new("subcategories"),
            selected: Mutex::new(None),
            selection_tx,
        });

        let listener = inner
            .store
            .listen(Query::collection(categories_collection()))?;
        let weak: Weak<TreeInner> = Arc::downgrade(&inner);
        inner.categories.attach(
            listener,
            Some(Box::new(move |categories: &[Category]| {
                if let Some(inner) = weak.upgrade() {
                    inner.select_default(categories);
                }
            })),
        );

        Ok(Self { inner })
    }

    /// Configured delete behavior.
    #[must_use]
    pub fn policy(&self) -> CategoryDeletePolicy {
        self.inner.policy
    }

    /// Current categories in key order.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.inner.categories.items()
    }

    /// The selected category, if any.
    #[must_use]
    pub fn selected_category(&self) -> Option<CategoryId> {
        self.inner.selection().clone()
    }

    /// Subcategories of the selected category.
    ///
    /// Empty while nothing is selected or the new selection has not loaded.
    #[must_use]
    pub fn subcategories(&self) -> Vec<Subcategory> {
        let _selected = self.inner.selection();
        self.inner.subcategories.items()
    }

    /// Whether the first categories snapshot has been applied.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.categories.is_loaded()
    }

    /// Wait until the first categories snapshot has been applied.
    pub async fn categories_ready(&self) {
        self.inner.categories.loaded().await;
    }

    /// Wait until the selected category's subcategories have loaded.
    pub async fn subcategories_ready(&self) {
        self.inner.subcategories.loaded().await;
    }

    /// Receiver that ticks when the categories list changes.
    #[must_use]
    pub fn category_changes(&self) -> watch::Receiver<u64> {
        self.inner.categories.changes()
    }

    /// Receiver that ticks when the subcategories list changes.
    #[must_use]
    pub fn subcategory_changes(&self) -> watch::Receiver<u64> {
        self.inner.subcategories.changes()
    }

    /// Receiver for selection changes.
    #[must_use]
    pub fn selection_changes(&self) -> watch::Receiver<Option<CategoryId>> {
        self.inner.selection_tx.subscribe()
    }

    /// Select a category and follow its subcategories.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the subcategory listener cannot start;
    /// the previous selection is kept.
    #[instrument(skip(self), fields(category_id = %id))]
    pub fn select_category(&self, id: &CategoryId) -> Result<(), AppError> {
        let mut selected = self.inner.selection();
        if selected.as_ref() == Some(id) {
            return Ok(());
        }
        self.inner.switch_to(&mut selected, id.clone()).map_err(|e| {
            error!(error = %e, "Failed to follow subcategories");
            AppError::Store(e)
        })
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Create a category. The name is stored exactly as given.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a blank name (nothing is written)
    /// or [`AppError::Store`] if the write fails.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<CategoryId, AppError> {
        let name = self.require_name(name, "Name is required")?;
        let result = match to_fields(&NameFields {
            name: name.as_str(),
        }) {
            Ok(fields) => self.inner.store.add(&categories_collection(), fields).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(id) => {
                info!(category_id = %id, "Category created");
                self.inner.notifier.success("Category created");
                Ok(CategoryId::new(id))
            }
            Err(e) => {
                error!(error = %e, "Failed to create category");
                self.inner.notifier.error("Operation failed");
                Err(e.into())
            }
        }
    }

    /// Rename a category. Products keep the name they were written with.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a blank name or
    /// [`AppError::Store`] if the write fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn rename_category(&self, id: &CategoryId, name: &str) -> Result<(), AppError> {
        let name = self.require_name(name, "Name is required")?;
        let result = self.write_name(&category_doc(id), &name).await;

        match result {
            Ok(()) => {
                info!("Category updated");
                self.inner.notifier.success("Category updated");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to rename category");
                self.inner.notifier.error("Operation failed");
                Err(e.into())
            }
        }
    }

    /// Delete a category according to the configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DeleteBlocked`] when the `Block` policy refuses,
    /// or [`AppError::Store`] if a read or delete fails.
    #[instrument(skip(self), fields(category_id = %id, policy = ?self.inner.policy))]
    pub async fn delete_category(&self, id: &CategoryId) -> Result<(), AppError> {
        let result = match self.inner.policy {
            CategoryDeletePolicy::Orphan => self.inner.store.delete(&category_doc(id)).await,
            CategoryDeletePolicy::Cascade => self.delete_with_children(id).await,
            CategoryDeletePolicy::Block => {
                if let Some(reason) = self.blocking_reason(id).await? {
                    warn!(reason, "Category delete blocked");
                    self.inner.notifier.warning(reason);
                    return Err(AppError::DeleteBlocked(reason.to_string()));
                }
                self.inner.store.delete(&category_doc(id)).await
            }
        };

        match result {
            Ok(()) => {
                info!("Category deleted");
                self.inner.notifier.success("Category deleted");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to delete category");
                self.inner.notifier.error("Delete failed");
                Err(e.into())
            }
        }
    }

    async fn delete_with_children(&self, id: &CategoryId) -> Result<(), StoreError> {
        let children = subcategories_of(id);
        let snapshot = self.inner.store.query(&Query::collection(children.clone())).await?;
        for doc in &snapshot.docs {
            self.inner.store.delete(&children.doc(&doc.id)).await?;
        }
        debug!(removed = snapshot.len(), "Deleted subcategories");
        self.inner.store.delete(&category_doc(id)).await
    }

    async fn blocking_reason(&self, id: &CategoryId) -> Result<Option<&'static str>, AppError> {
        self.find_dependents(id).await.map_err(|e| {
            error!(error = %e, "Failed to check category children");
            self.inner.notifier.error("Delete failed");
            AppError::Store(e)
        })
    }

    async fn find_dependents(&self, id: &CategoryId) -> Result<Option<&'static str>, StoreError> {
        let children = self
            .inner
            .store
            .query(&Query::collection(subcategories_of(id)))
            .await?;
        if !children.is_empty() {
            return Ok(Some("Category has sub-categories"));
        }

        let products = Query::collection(products_collection()).where_eq("categoryId", id.as_str());
        if !self.inner.store.query(&products).await?.is_empty() {
            return Ok(Some("Category has products"));
        }
        Ok(None)
    }

    // =========================================================================
    // Subcategories
    // =========================================================================

    /// Create a subcategory under the selected category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoCategorySelected`] with no selection,
    /// [`AppError::Validation`] for a blank name, or [`AppError::Store`] if
    /// the write fails.
    #[instrument(skip(self))]
    pub async fn create_subcategory(&self, name: &str) -> Result<SubcategoryId, AppError> {
        let parent = self.require_selection()?;
        let name = self.require_name(name, "Sub-category name is required")?;
        let result = match to_fields(&NameFields {
            name: name.as_str(),
        }) {
            Ok(fields) => self.inner.store.add(&subcategories_of(&parent), fields).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(id) => {
                info!(category_id = %parent, subcategory_id = %id, "Sub-category created");
                self.inner.notifier.success("Sub-category created");
                Ok(SubcategoryId::new(id))
            }
            Err(e) => {
                error!(error = %e, category_id = %parent, "Failed to create sub-category");
                self.inner.notifier.error("Save failed");
                Err(e.into())
            }
        }
    }

    /// Rename a subcategory of the selected category.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_subcategory`].
    #[instrument(skip(self), fields(subcategory_id = %id))]
    pub async fn rename_subcategory(&self, id: &SubcategoryId, name: &str) -> Result<(), AppError> {
        let parent = self.require_selection()?;
        let name = self.require_name(name, "Sub-category name is required")?;
        let result = self
            .write_name(&subcategories_of(&parent).doc(id), &name)
            .await;

        match result {
            Ok(()) => {
                info!(category_id = %parent, "Sub-category updated");
                self.inner.notifier.success("Sub-category updated");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, category_id = %parent, "Failed to rename sub-category");
                self.inner.notifier.error("Save failed");
                Err(e.into())
            }
        }
    }

    /// Delete a subcategory of the selected category.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoCategorySelected`] with no selection or
    /// [`AppError::Store`] if the delete fails.
    #[instrument(skip(self), fields(subcategory_id = %id))]
    pub async fn delete_subcategory(&self, id: &SubcategoryId) -> Result<(), AppError> {
        let parent = self.require_selection()?;
        match self
            .inner
            .store
            .delete(&subcategories_of(&parent).doc(id))
            .await
        {
            Ok(()) => {
                info!(category_id = %parent, "Sub-category deleted");
                self.inner.notifier.success("Sub-category deleted");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, category_id = %parent, "Failed to delete sub-category");
                self.inner.notifier.error("Delete failed");
                Err(e.into())
            }
        }
    }

    /// Read the category and subcategory a new product is filed under.
    ///
    /// The names are read from the store rather than the mirrors so the
    /// product gets the names current at write time.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if either document is missing or
    /// [`AppError::Store`] if a read fails.
    #[instrument(skip(self))]
    pub async fn resolve_placement(
        &self,
        category_id: &CategoryId,
        subcategory_id: &SubcategoryId,
    ) -> Result<Placement, AppError> {
        let category_path = category_doc(category_id);
        let category: Category = self
            .inner
            .store
            .get(&category_path)
            .await?
            .ok_or_else(|| AppError::NotFound(category_path.to_string()))?
            .decode()?;

        let subcategory_path = subcategories_of(category_id).doc(subcategory_id);
        let subcategory: Subcategory = self
            .inner
            .store
            .get(&subcategory_path)
            .await?
            .ok_or_else(|| AppError::NotFound(subcategory_path.to_string()))?
            .decode()?;

        Ok(Placement {
            category,
            subcategory,
        })
    }

    fn require_selection(&self) -> Result<CategoryId, AppError> {
        self.selected_category().ok_or_else(|| {
            debug!("No category selected");
            AppError::NoCategorySelected
        })
    }

    fn require_name(&self, name: &str, message: &str) -> Result<RequiredName, AppError> {
        RequiredName::parse(name).map_err(|e| {
            self.inner.notifier.warning(message);
            AppError::Validation(ValidationError::Name(e))
        })
    }

    async fn write_name(&self, doc: &DocumentPath, name: &RequiredName) -> Result<(), StoreError> {
        let fields = to_fields(&NameFields {
            name: name.as_str(),
        })?;
        self.inner.store.update(doc, fields).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::notices::NoticeLevel;
    use crate::store::MemoryStore;

    async fn settle<F: Fn() -> bool>(mut rx: watch::Receiver<u64>, done: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !done() {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    fn tree(store: &MemoryStore, policy: CategoryDeletePolicy) -> (CategoryTree, Notifier) {
        let notifier = Notifier::new();
        let tree = CategoryTree::new(Arc::new(store.clone()), notifier.clone(), policy).unwrap();
        (tree, notifier)
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected_without_writing() {
        let store = MemoryStore::new();
        let (tree, notifier) = tree(&store, CategoryDeletePolicy::Orphan);
        let before = store.operations();

        let err = tree.create_category("   ").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.operations(), before);
        let notices = notifier.drain_recent();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(notices[0].message, "Name is required");
    }

    #[tokio::test]
    async fn test_first_category_becomes_selected() {
        let store = MemoryStore::new();
        let (tree, _) = tree(&store, CategoryDeletePolicy::Orphan);
        tree.categories_ready().await;
        assert!(tree.selected_category().is_none());

        let id = tree.create_category("Rings").await.unwrap();
        let mut selection = tree.selection_changes();
        tokio::time::timeout(Duration::from_secs(2), selection.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tree.selected_category(), Some(id));
    }

    #[tokio::test]
    async fn test_subcategory_commands_need_a_selection() {
        let store = MemoryStore::new();
        let (tree, notifier) = tree(&store, CategoryDeletePolicy::Orphan);
        tree.categories_ready().await;

        let err = tree.create_subcategory("Gold Rings").await.unwrap_err();
        assert!(matches!(err, AppError::NoCategorySelected));
        assert!(notifier.drain_recent().is_empty());
    }

    #[tokio::test]
    async fn test_rename_keeps_literal_input() {
        let store = MemoryStore::new();
        let (tree, _) = tree(&store, CategoryDeletePolicy::Orphan);
        let id = tree.create_category("Rings").await.unwrap();

        tree.rename_category(&id, "  Bands  ").await.unwrap();

        let doc = store.get(&category_doc(&id)).await.unwrap().unwrap();
        assert_eq!(doc.data["name"], "  Bands  ");
    }

    #[tokio::test]
    async fn test_block_policy_refuses_parent_with_children() {
        let store = MemoryStore::new();
        let (tree, notifier) = tree(&store, CategoryDeletePolicy::Block);
        let id = tree.create_category("Rings").await.unwrap();
        tree.select_category(&id).unwrap();
        tree.create_subcategory("Gold Rings").await.unwrap();
        notifier.drain_recent();

        let err = tree.delete_category(&id).await.unwrap_err();

        assert!(matches!(err, AppError::DeleteBlocked(_)));
        assert!(store.get(&category_doc(&id)).await.unwrap().is_some());
        assert_eq!(notifier.drain_recent()[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn test_cascade_policy_removes_children() {
        let store = MemoryStore::new();
        let (tree, _) = tree(&store, CategoryDeletePolicy::Cascade);
        let id = tree.create_category("Rings").await.unwrap();
        tree.select_category(&id).unwrap();
        tree.create_subcategory("Gold Rings").await.unwrap();

        tree.delete_category(&id).await.unwrap();

        let left = store
            .query(&Query::collection(subcategories_of(&id)))
            .await
            .unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn test_selection_survives_category_delete() {
        let store = MemoryStore::new();
        let (tree, _) = tree(&store, CategoryDeletePolicy::Orphan);
        let id = tree.create_category("Rings").await.unwrap();
        tree.select_category(&id).unwrap();

        tree.delete_category(&id).await.unwrap();
        settle(tree.category_changes(), || tree.categories().is_empty()).await;

        assert_eq!(tree.selected_category(), Some(id));
    }

    #[tokio::test]
    async fn test_resolve_placement_requires_both_documents() {
        let store = MemoryStore::new();
        let (tree, _) = tree(&store, CategoryDeletePolicy::Orphan);
        let category = tree.create_category("Rings").await.unwrap();
        tree.select_category(&category).unwrap();
        let sub = tree.create_subcategory("Gold Rings").await.unwrap();

        let placement = tree.resolve_placement(&category, &sub).await.unwrap();
        assert_eq!(placement.category.name, "Rings");
        assert_eq!(placement.subcategory.name, "Gold Rings");

        let missing = SubcategoryId::new("missing");
        let err = tree.resolve_placement(&category, &missing).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
