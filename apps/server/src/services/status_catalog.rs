//! Case run status catalog with a bounded read cache.
//!
//! The cache is owned by the catalog and cleared in full by every mutation
//! that goes through it. When the entry cap is reached the whole cache is
//! dropped instead of evicting single entries; the catalog holds a handful of
//! rows and changes rarely, so this is not meant as a general-purpose cache.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::status::{IDLE, canonical_name};
use crate::models::{NewStatus, StatusDefinition, StatusRef};

use super::store::StatusStore;

/// Default number of cached lookups before the cache resets.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Cache key: lookup operation plus its argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    All,
    ByName(String),
    ById(i32),
    CompleteIds,
    FailureIds,
}

/// Cached lookup result.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Statuses(Arc<Vec<StatusDefinition>>),
    Status(StatusDefinition),
    Ids(BTreeSet<i32>),
}

/// Bounded lookup cache that resets under pressure.
///
/// Every invalidation starts a new generation. A lookup takes the generation
/// before reading the store and hands it back to [`StatusCache::set`]; results
/// read before an invalidation are dropped instead of cached.
#[derive(Debug)]
pub struct StatusCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    generation: u64,
}

impl StatusCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Current generation; take it before reading the store.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store an entry read during `generation`, clearing everything first when
    /// the cap would be exceeded. Returns false when the cache was invalidated
    /// since and the entry was discarded.
    pub fn set(&self, key: CacheKey, entry: CacheEntry, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(?key, "Status cache invalidated during lookup, result not cached");
            return false;
        }
        if state.entries.len() >= self.capacity && !state.entries.contains_key(&key) {
            debug!(
                capacity = self.capacity,
                "Status cache full, clearing all entries"
            );
            state.entries.clear();
        }
        state.entries.insert(key, entry);
        true
    }

    /// Drop every cached entry and start a new generation.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Entries are plain values; a panic mid-insert cannot leave them inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Name/id lookups over the case run status catalog.
pub struct StatusCatalog {
    store: Arc<dyn StatusStore>,
    cache: StatusCache,
}

impl StatusCatalog {
    pub fn new(store: Arc<dyn StatusStore>, cache: StatusCache) -> Self {
        Self { store, cache }
    }

    /// The catalog's cache (exposed for inspection).
    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Every status ordered by id.
    pub async fn all(&self) -> AppResult<Arc<Vec<StatusDefinition>>> {
        let generation = self.cache.generation();
        if let Some(CacheEntry::Statuses(statuses)) = self.cache.get(&CacheKey::All) {
            return Ok(statuses);
        }

        let mut statuses = self.store.list_statuses().await?;
        statuses.sort_by_key(|s| s.id);
        let statuses = Arc::new(statuses);
        self.cache.set(
            CacheKey::All,
            CacheEntry::Statuses(statuses.clone()),
            generation,
        );
        Ok(statuses)
    }

    /// Case-insensitive lookup by name.
    pub async fn resolve_by_name(&self, name: &str) -> AppResult<StatusDefinition> {
        let name = canonical_name(name);
        let key = CacheKey::ByName(name.clone());
        let generation = self.cache.generation();
        if let Some(CacheEntry::Status(status)) = self.cache.get(&key) {
            return Ok(status);
        }

        let status = self
            .store
            .find_status_by_name(&name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case run status '{}'", name)))?;
        self.cache
            .set(key, CacheEntry::Status(status.clone()), generation);
        Ok(status)
    }

    pub async fn resolve_by_id(&self, id: i32) -> AppResult<StatusDefinition> {
        let key = CacheKey::ById(id);
        let generation = self.cache.generation();
        if let Some(CacheEntry::Status(status)) = self.cache.get(&key) {
            return Ok(status);
        }

        let status = self
            .store
            .find_status_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case run status {}", id)))?;
        self.cache
            .set(key, CacheEntry::Status(status.clone()), generation);
        Ok(status)
    }

    /// Resolve a status given by id or by name.
    pub async fn resolve(&self, status: &StatusRef) -> AppResult<StatusDefinition> {
        match status {
            StatusRef::Id(id) => self.resolve_by_id(*id).await,
            StatusRef::Name(name) => self.resolve_by_name(name).await,
        }
    }

    /// The status new case runs start in.
    pub async fn idle(&self) -> AppResult<StatusDefinition> {
        self.resolve_by_name(IDLE).await
    }

    /// Snapshot of id → name.
    pub async fn names_by_id(&self) -> AppResult<BTreeMap<i32, String>> {
        Ok(self
            .all()
            .await?
            .iter()
            .map(|s| (s.id, s.name.clone()))
            .collect())
    }

    /// Snapshot of name → id.
    pub async fn ids_by_name(&self) -> AppResult<BTreeMap<String, i32>> {
        Ok(self
            .names_by_id()
            .await?
            .into_iter()
            .map(|(id, name)| (name, id))
            .collect())
    }

    pub async fn complete_status_ids(&self) -> AppResult<BTreeSet<i32>> {
        self.ids_where(CacheKey::CompleteIds, StatusDefinition::is_complete)
            .await
    }

    pub async fn failure_status_ids(&self) -> AppResult<BTreeSet<i32>> {
        self.ids_where(CacheKey::FailureIds, StatusDefinition::is_failure)
            .await
    }

    async fn ids_where(
        &self,
        key: CacheKey,
        predicate: fn(&StatusDefinition) -> bool,
    ) -> AppResult<BTreeSet<i32>> {
        let generation = self.cache.generation();
        if let Some(CacheEntry::Ids(ids)) = self.cache.get(&key) {
            return Ok(ids);
        }

        let ids: BTreeSet<i32> = self
            .all()
            .await?
            .iter()
            .filter(|s| predicate(s))
            .map(|s| s.id)
            .collect();
        self.cache.set(key, CacheEntry::Ids(ids.clone()), generation);
        Ok(ids)
    }

    /// Add a status. Invalidates the cache.
    pub async fn create(&self, mut status: NewStatus) -> AppResult<StatusDefinition> {
        status.name = canonical_name(&status.name);
        if status.name.is_empty() {
            return Err(AppError::InvalidInput(
                "Status name must not be empty".to_string(),
            ));
        }
        if self.store.find_status_by_name(&status.name).await?.is_some() {
            return Err(AppError::InvalidInput(format!(
                "Status '{}' already exists",
                status.name
            )));
        }

        let result = self.store.insert_status(status).await;
        self.cache.invalidate();
        let created = result?;
        info!(status_id = created.id, name = %created.name, "Case run status created");
        Ok(created)
    }

    /// Rename a status. Invalidates the cache.
    pub async fn rename(&self, id: i32, name: &str) -> AppResult<StatusDefinition> {
        let name = canonical_name(name);
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "Status name must not be empty".to_string(),
            ));
        }
        if let Some(existing) = self.store.find_status_by_name(&name).await?
            && existing.id != id
        {
            return Err(AppError::InvalidInput(format!(
                "Status '{}' already exists",
                name
            )));
        }

        let result = self.store.update_status_name(id, &name).await;
        self.cache.invalidate();
        let renamed = result?;
        info!(status_id = id, name = %renamed.name, "Case run status renamed");
        Ok(renamed)
    }

    /// Delete a status that no case run uses. Invalidates the cache.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let in_use = self.store.count_case_runs_with_status(id).await?;
        if in_use > 0 {
            return Err(AppError::InvalidInput(format!(
                "Case run status {} is used by {} case runs",
                id, in_use
            )));
        }

        let result = self.store.delete_status(id).await;
        self.cache.invalidate();
        result?;
        info!(status_id = id, "Case run status deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::models::status::{ERROR, FAILED, PASSED, WAIVED};
    use crate::test_support::InMemoryStore;

    fn catalog(store: &Arc<InMemoryStore>) -> StatusCatalog {
        StatusCatalog::new(store.clone(), StatusCache::default())
    }

    #[tokio::test]
    async fn test_resolve_by_name_is_case_insensitive() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        let passed = catalog.resolve_by_name("passed").await.unwrap();
        assert_eq!(passed.name, PASSED);
        assert_eq!(catalog.resolve_by_name(" Passed ").await.unwrap(), passed);
    }

    #[tokio::test]
    async fn test_unknown_status_is_not_found() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        assert!(matches!(
            catalog.resolve_by_name("SKIPPED").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.resolve_by_id(999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_status_ref() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        let by_name = catalog
            .resolve(&StatusRef::Name("blocked".to_string()))
            .await
            .unwrap();
        let by_id = catalog.resolve(&StatusRef::Id(by_name.id)).await.unwrap();
        assert_eq!(by_name, by_id);
    }

    #[tokio::test]
    async fn test_lookups_are_served_from_cache() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        catalog.resolve_by_id(2).await.unwrap();
        let reads = store.status_reads();
        catalog.resolve_by_id(2).await.unwrap();
        assert_eq!(store.status_reads(), reads);
    }

    #[tokio::test]
    async fn test_class_ids_follow_names() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);
        let ids = catalog.ids_by_name().await.unwrap();

        let complete = catalog.complete_status_ids().await.unwrap();
        let expected: BTreeSet<i32> = [PASSED, ERROR, FAILED, WAIVED]
            .iter()
            .map(|name| ids[*name])
            .collect();
        assert_eq!(complete, expected);

        let failure = catalog.failure_status_ids().await.unwrap();
        let expected: BTreeSet<i32> = [ERROR, FAILED].iter().map(|name| ids[*name]).collect();
        assert_eq!(failure, expected);
    }

    #[tokio::test]
    async fn test_names_by_id_snapshot() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        let names = catalog.names_by_id().await.unwrap();
        assert_eq!(names.len(), 8);
        assert_eq!(names[&1], IDLE);
        assert_eq!(catalog.idle().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_rename_invalidates_cache() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        let waived = catalog.resolve_by_name("WAIVED").await.unwrap();
        catalog.names_by_id().await.unwrap();
        assert!(!catalog.cache().is_empty());

        catalog.rename(waived.id, "skipped").await.unwrap();
        assert!(catalog.cache().is_empty());

        assert!(matches!(
            catalog.resolve_by_name("WAIVED").await,
            Err(AppError::NotFound(_))
        ));
        let skipped = catalog.resolve_by_name("SKIPPED").await.unwrap();
        assert_eq!(skipped.id, waived.id);
        assert_eq!(catalog.names_by_id().await.unwrap()[&waived.id], "SKIPPED");
    }

    #[tokio::test]
    async fn test_renamed_status_leaves_complete_class() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        let waived = catalog.resolve_by_name(WAIVED).await.unwrap();
        assert!(catalog.complete_status_ids().await.unwrap().contains(&waived.id));

        catalog.rename(waived.id, "SKIPPED").await.unwrap();
        assert!(!catalog.complete_status_ids().await.unwrap().contains(&waived.id));
    }

    #[tokio::test]
    async fn test_rename_to_existing_name_is_rejected() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        assert!(matches!(
            catalog.rename(2, "failed").await,
            Err(AppError::InvalidInput(_))
        ));
        // Renaming to its own name is allowed
        assert!(catalog.rename(2, "passed").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_and_delete_invalidate_cache() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);

        assert_eq!(catalog.all().await.unwrap().len(), 8);
        let created = catalog
            .create(NewStatus {
                name: "retest".to_string(),
                sortkey: 9,
                description: None,
                auto_blinddown: true,
            })
            .await
            .unwrap();
        assert_eq!(created.name, "RETEST");
        assert_eq!(catalog.all().await.unwrap().len(), 9);

        catalog.delete(created.id).await.unwrap();
        assert_eq!(catalog.all().await.unwrap().len(), 8);
        assert!(matches!(
            catalog.resolve_by_name("RETEST").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_refuses_status_in_use() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let catalog = catalog(&store);
        let run_id = store.insert_run(true);
        let case_run_id = store.add_case_run(run_id, 8);

        assert!(matches!(
            catalog.delete(8).await,
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(catalog.resolve_by_id(8).await.unwrap().name, WAIVED);
        assert_eq!(store.count_case_runs_with_status(8).await.unwrap(), 1);

        store.remove_case_run(case_run_id);
        catalog.delete(8).await.unwrap();
        assert!(matches!(
            catalog.resolve_by_id(8).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_cache_resets_when_full() {
        let cache = StatusCache::new(3);
        for id in 0..3 {
            cache.set(CacheKey::ById(id), CacheEntry::Ids(BTreeSet::new()), 0);
        }
        assert_eq!(cache.len(), 3);

        // Overwriting an existing key does not reset
        cache.set(CacheKey::ById(1), CacheEntry::Ids(BTreeSet::new()), 0);
        assert_eq!(cache.len(), 3);

        cache.set(CacheKey::ById(3), CacheEntry::Ids(BTreeSet::new()), 0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::ById(0)).is_none());
        assert!(cache.get(&CacheKey::ById(3)).is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = StatusCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.set(CacheKey::All, CacheEntry::Ids(BTreeSet::new()), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_from_previous_generation_is_discarded() {
        let cache = StatusCache::default();
        let generation = cache.generation();
        cache.invalidate();

        assert!(!cache.set(CacheKey::ById(8), CacheEntry::Ids(BTreeSet::new()), generation));
        assert!(cache.is_empty());

        assert!(cache.set(
            CacheKey::ById(8),
            CacheEntry::Ids(BTreeSet::new()),
            cache.generation()
        ));
        assert_eq!(cache.len(), 1);
    }

    /// Holds one name lookup after it has read the store until released.
    struct PausingStore {
        inner: Arc<InMemoryStore>,
        pause_on: String,
        armed: AtomicBool,
        reached: Notify,
        resume: Notify,
    }

    impl PausingStore {
        fn new(inner: Arc<InMemoryStore>, pause_on: &str) -> Self {
            Self {
                inner,
                pause_on: pause_on.to_string(),
                armed: AtomicBool::new(true),
                reached: Notify::new(),
                resume: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl StatusStore for PausingStore {
        async fn list_statuses(&self) -> AppResult<Vec<StatusDefinition>> {
            self.inner.list_statuses().await
        }

        async fn find_status_by_name(&self, name: &str) -> AppResult<Option<StatusDefinition>> {
            let found = self.inner.find_status_by_name(name).await;
            if name == self.pause_on && self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.resume.notified().await;
            }
            found
        }

        async fn find_status_by_id(&self, id: i32) -> AppResult<Option<StatusDefinition>> {
            self.inner.find_status_by_id(id).await
        }

        async fn insert_status(&self, status: NewStatus) -> AppResult<StatusDefinition> {
            self.inner.insert_status(status).await
        }

        async fn update_status_name(&self, id: i32, name: &str) -> AppResult<StatusDefinition> {
            self.inner.update_status_name(id, name).await
        }

        async fn count_case_runs_with_status(&self, id: i32) -> AppResult<u64> {
            self.inner.count_case_runs_with_status(id).await
        }

        async fn delete_status(&self, id: i32) -> AppResult<()> {
            self.inner.delete_status(id).await
        }
    }

    #[tokio::test]
    async fn test_lookup_racing_rename_does_not_cache_old_name() {
        let store = Arc::new(PausingStore::new(
            Arc::new(InMemoryStore::with_default_statuses()),
            WAIVED,
        ));
        let catalog = Arc::new(StatusCatalog::new(store.clone(), StatusCache::default()));

        let reader = tokio::spawn({
            let catalog = catalog.clone();
            async move { catalog.resolve_by_name(WAIVED).await }
        });
        store.reached.notified().await;

        let waived_id = 8;
        catalog.rename(waived_id, "SKIPPED").await.unwrap();
        store.resume.notify_one();

        // The in-flight lookup still answers with what it read
        assert_eq!(reader.await.unwrap().unwrap().name, WAIVED);

        assert!(matches!(
            catalog.resolve_by_name(WAIVED).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(catalog.resolve_by_name("SKIPPED").await.unwrap().id, waived_id);
    }
}
