//! Schema cache: an arena of published shapes with deferred resolution.
//!
//! Construction runs inside a transaction that holds the build lock:
//!
//! 1. a key that is not yet published gets a reserved [`SchemaId`],
//! 2. its builder runs and may reference any key, including its own or one
//!    that is still being built, and receives the reserved id for it,
//! 3. when the outermost builder succeeds every entry of the transaction is
//!    published at once; when it fails nothing is kept.
//!
//! Published entries live in lock-free maps, so validation never takes the
//! build lock.

use crate::config::ValidationConfig;
use crate::datatypes::{self, ComplexType};
use crate::error::{FhirShapeError, Result};
use crate::registry::{self, NEVER_KEY, ResourceKind, UNION_KEY};
use crate::resources;
use crate::schema::{Schema, ShapeOptions, Validated};
use crate::shape::{SchemaId, SchemaKey, ShapeNode};
use papaya::HashMap as PapayaMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, trace, warn};

/// One published schema
#[derive(Debug)]
pub(crate) struct SchemaEntry {
    pub key: SchemaKey,
    pub node: ShapeNode,
}

pub(crate) struct CacheInner {
    config: ValidationConfig,
    index: PapayaMap<SchemaKey, SchemaId>,
    entries: PapayaMap<SchemaId, Arc<SchemaEntry>>,
    next_id: AtomicU32,
    build_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    rollbacks: AtomicU64,
}

impl CacheInner {
    fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            index: PapayaMap::new(),
            entries: PapayaMap::new(),
            next_id: AtomicU32::new(0),
            build_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Published id for `key`, counted as a cache hit
    pub fn lookup(&self, key: &SchemaKey) -> Option<SchemaId> {
        let id = self.find(key);
        if id.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("Schema cache hit for {}", key);
        }
        id
    }

    /// Published id for `key` without touching the counters
    fn find(&self, key: &SchemaKey) -> Option<SchemaId> {
        self.index.pin().get(key).copied()
    }

    /// Published entry for `id`
    pub fn entry(&self, id: SchemaId) -> Option<Arc<SchemaEntry>> {
        let guard = self.entries.pin();
        guard.get(&id).cloned()
    }

    /// Name of a published schema, or its id when unknown
    pub fn name_of(&self, id: SchemaId) -> String {
        self.entry(id)
            .map(|entry| entry.key.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn len(&self) -> usize {
        self.entries.pin().len()
    }

    fn reserve(&self) -> SchemaId {
        SchemaId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Run `build` with exclusive construction rights and publish its results
    fn transaction<T>(&self, build: impl FnOnce(&mut BuildContext<'_>) -> Result<T>) -> Result<T> {
        let _lock = self
            .build_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut ctx = BuildContext {
            cache: self,
            pending_index: HashMap::new(),
            pending: Vec::new(),
        };

        match build(&mut ctx) {
            Ok(result) => {
                ctx.publish();
                Ok(result)
            }
            Err(err) => {
                self.rollbacks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Discarding {} reserved schema(s) after failed build: {}",
                    ctx.pending_index.len(),
                    err
                );
                Err(err)
            }
        }
    }
}

/// Construction state of one cache transaction
pub(crate) struct BuildContext<'c> {
    cache: &'c CacheInner,
    pending_index: HashMap<SchemaKey, SchemaId>,
    pending: Vec<(SchemaId, SchemaEntry)>,
}

impl<'c> BuildContext<'c> {
    /// Id for `key`, building it on a miss.
    ///
    /// A key already reserved in this transaction resolves to its reserved
    /// id even when its body is not finished yet.
    pub fn resolve<F>(&mut self, key: SchemaKey, build: F) -> Result<SchemaId>
    where
        F: FnOnce(&mut BuildContext<'c>, SchemaId) -> Result<ShapeNode>,
    {
        if let Some(id) = self.cache.find(&key) {
            return Ok(id);
        }
        if let Some(id) = self.pending_index.get(&key) {
            return Ok(*id);
        }

        let id = self.cache.reserve();
        self.cache.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Building schema {} as {}", key, id);
        self.pending_index.insert(key.clone(), id);

        let node = build(self, id)?;
        self.pending.push((id, SchemaEntry { key, node }));
        Ok(id)
    }

    /// Entries go in before the index so a published id always dereferences
    fn publish(self) {
        if self.pending.is_empty() {
            return;
        }

        let count = self.pending.len();
        let entries = self.cache.entries.pin();
        for (id, entry) in self.pending {
            entries.insert(id, Arc::new(entry));
        }
        let index = self.cache.index.pin();
        for (key, id) in self.pending_index {
            index.insert(key, id);
        }
        debug!("Published {} schema(s)", count);
    }
}

/// Counters reported by [`SchemaCache::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    /// Schemas whose builder ran
    pub misses: u64,
    /// Transactions discarded after a failed build
    pub rollbacks: u64,
}

/// Outcome of [`SchemaCache::warm_up`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmUpReport {
    /// Schemas published by this call
    pub built: usize,
    /// Schemas in the cache afterwards
    pub total: usize,
    pub resource_kinds: usize,
}

/// Process-scoped schema registry.
///
/// Cloning is cheap; clones share the same arena. Schemas from one cache
/// cannot be used as parameters of another.
#[derive(Clone)]
pub struct SchemaCache {
    inner: Arc<CacheInner>,
}

impl SchemaCache {
    /// Create an empty cache with the default configuration
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner::new(ValidationConfig::default())),
        }
    }

    /// Create a cache with a custom configuration, warming it up when
    /// `eager_warm_up` is set
    pub fn with_config(config: ValidationConfig) -> Result<Self> {
        config.validate()?;
        let eager = config.eager_warm_up;
        let cache = Self {
            inner: Arc::new(CacheInner::new(config)),
        };
        if eager {
            cache.warm_up()?;
        }
        Ok(cache)
    }

    pub fn config(&self) -> &ValidationConfig {
        self.inner.config()
    }

    pub(crate) fn inner(&self) -> &CacheInner {
        &self.inner
    }

    pub(crate) fn same_cache(&self, other: &SchemaCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Published id for `key`, or the id `build` resolves under the build lock.
    ///
    /// The lookup is lock-free, so a published schema never waits behind a
    /// running build.
    fn published_or_build(
        &self,
        key: &SchemaKey,
        build: impl FnOnce(&mut BuildContext<'_>) -> Result<SchemaId>,
    ) -> Result<SchemaId> {
        if let Some(id) = self.inner.lookup(key) {
            return Ok(id);
        }
        self.inner.transaction(build)
    }

    /// Id for `key`, building its node on first use
    #[cfg(test)]
    pub(crate) fn get_or_build<F>(&self, key: SchemaKey, build: F) -> Result<SchemaId>
    where
        F: for<'c> FnOnce(&mut BuildContext<'c>, SchemaId) -> Result<ShapeNode>,
    {
        self.published_or_build(&key.clone(), |ctx| ctx.resolve(key, build))
    }

    fn handle(&self, id: SchemaId) -> Schema {
        Schema::new(id, self.clone())
    }

    /// Schema for resource kind `kind` with the given contained policy
    pub fn resource(&self, kind: ResourceKind, options: ShapeOptions) -> Result<Schema> {
        if !resources::is_transcribed(kind) {
            return Err(FhirShapeError::unsupported_kind(kind.as_str()));
        }
        if let Some(contained) = options.contained() {
            if !self.same_cache(contained.cache()) {
                return Err(FhirShapeError::ForeignSchema { id: contained.id() });
            }
        }

        // Only the contained parameter differs between keys of one kind
        let param = if !options.allows_contained() {
            self.inner.find(&SchemaKey::new(NEVER_KEY))
        } else if let Some(custom) = options.contained() {
            Some(custom.id())
        } else {
            self.inner.find(&SchemaKey::new(UNION_KEY))
        };
        if let Some(id) = param.and_then(|param| self.inner.lookup(&resources::key(kind, param))) {
            return Ok(self.handle(id));
        }

        let id = self.inner.transaction(|ctx| {
            let element = if !options.allows_contained() {
                registry::resolve_never(ctx)?
            } else if let Some(custom) = options.contained() {
                custom.id()
            } else {
                registry::resolve_union(ctx)?
            };
            resources::resolve(ctx, kind, element)
        })?;
        Ok(self.handle(id))
    }

    /// Schema for a shared complex datatype
    pub fn datatype(&self, datatype: ComplexType) -> Result<Schema> {
        let key = SchemaKey::new(datatype.as_str());
        let id = self.published_or_build(&key, |ctx| datatypes::resolve(ctx, datatype))?;
        Ok(self.handle(id))
    }

    /// Union schema dispatching on `resourceType`
    pub fn any_resource(&self) -> Result<Schema> {
        let id = self.published_or_build(&SchemaKey::new(UNION_KEY), registry::resolve_union)?;
        Ok(self.handle(id))
    }

    /// Validate a value as any known resource kind.
    ///
    /// Invalid documents are reported as [`FhirShapeError::Invalid`].
    pub fn validate_any_resource(&self, value: &serde_json::Value) -> Result<Validated> {
        let schema = self.any_resource()?;
        schema.validate(value).map_err(FhirShapeError::Invalid)
    }

    /// Build the union, every transcribed resource kind and every datatype
    pub fn warm_up(&self) -> Result<WarmUpReport> {
        let before = self.inner.len();
        self.inner.transaction(|ctx| {
            registry::resolve_union(ctx)?;
            for datatype in ComplexType::ALL {
                datatypes::resolve(ctx, *datatype)?;
            }
            Ok(())
        })?;
        let total = self.inner.len();
        let report = WarmUpReport {
            built: total.saturating_sub(before),
            total,
            resource_kinds: resources::TRANSCRIBED.len(),
        };
        info!(
            "Schema cache warmed up: {} built, {} total, {} resource kinds",
            report.built, report.total, report.resource_kinds
        );
        Ok(report)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            rollbacks: self.inner.rollbacks.load(Ordering::Relaxed),
        }
    }

    /// Number of published schemas
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("config", &self.inner.config)
            .field("entries", &self.inner.len())
            .field("hits", &self.inner.hits.load(Ordering::Relaxed))
            .field("misses", &self.inner.misses.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn never(reason: &str) -> Result<ShapeNode> {
        Ok(ShapeNode::Never {
            reason: reason.to_string(),
        })
    }

    #[test]
    fn test_second_lookup_skips_builder() {
        let cache = SchemaCache::new();
        let first = cache
            .get_or_build(SchemaKey::new("Sample"), |_, _| never("sample"))
            .unwrap();
        let second = cache
            .get_or_build(SchemaKey::new("Sample"), |_, _| {
                panic!("builder must not run for a published key")
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_self_reference_resolves_to_reserved_id() {
        let cache = SchemaCache::new();
        let mut seen = None;
        let id = cache
            .get_or_build(SchemaKey::new("Loop"), |ctx, reserved| {
                let inner = ctx.resolve(SchemaKey::new("Loop"), |_, _| {
                    panic!("reserved key must not be rebuilt")
                })?;
                seen = Some((reserved, inner));
                never("loop")
            })
            .unwrap();
        let (reserved, inner) = seen.unwrap();
        assert_eq!(id, reserved);
        assert_eq!(id, inner);
    }

    #[test]
    fn test_failed_build_leaves_no_entry() {
        let cache = SchemaCache::new();
        let result = cache.get_or_build(SchemaKey::new("Outer"), |ctx, _| {
            ctx.resolve(SchemaKey::new("Inner"), |_, _| never("inner"))?;
            Err(FhirShapeError::build("Outer", "boom"))
        });
        assert!(matches!(result, Err(FhirShapeError::Build { .. })));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rollbacks, 1);

        // Retrying runs the builders again and publishes both entries
        let outer = cache
            .get_or_build(SchemaKey::new("Outer"), |ctx, _| {
                ctx.resolve(SchemaKey::new("Inner"), |_, _| never("inner"))?;
                never("outer")
            })
            .unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.inner().entry(outer).is_some());
    }

    #[test]
    fn test_params_are_part_of_the_key() {
        let cache = SchemaCache::new();
        let a = cache
            .get_or_build(SchemaKey::new("Param"), |_, _| never("a"))
            .unwrap();
        let plain = cache
            .get_or_build(SchemaKey::new("Shape"), |_, _| never("plain"))
            .unwrap();
        let with_a = cache
            .get_or_build(SchemaKey::with_params("Shape", vec![a]), |_, _| never("a"))
            .unwrap();
        assert_ne!(plain, with_a);
    }

    #[test]
    fn test_published_schemas_resolve_while_a_build_holds_the_lock() {
        let cache = SchemaCache::new();
        let patient = cache
            .resource(ResourceKind::Patient, ShapeOptions::default())
            .unwrap();
        let strict = cache
            .resource(ResourceKind::Patient, ShapeOptions::forbid_contained())
            .unwrap();
        let coding = cache.datatype(ComplexType::Coding).unwrap();
        let any = cache.any_resource().unwrap();

        let guard = cache
            .inner
            .build_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            scope.spawn(|| {
                let ids = (
                    cache.resource(ResourceKind::Patient, ShapeOptions::default()),
                    cache.resource(ResourceKind::Patient, ShapeOptions::forbid_contained()),
                    cache.datatype(ComplexType::Coding),
                    cache.any_resource(),
                );
                let _ = tx.send(ids);
            });
            let received = rx.recv_timeout(Duration::from_millis(500));
            drop(guard);

            let (a, b, c, d) = received.expect("published lookups must not wait on the build lock");
            assert_eq!(a.unwrap(), patient);
            assert_eq!(b.unwrap(), strict);
            assert_eq!(c.unwrap(), coding);
            assert_eq!(d.unwrap(), any);
        });
    }

    #[test]
    fn test_lookups_inside_a_build_are_not_hits() {
        let cache = SchemaCache::new();
        cache
            .resource(ResourceKind::Patient, ShapeOptions::default())
            .unwrap();
        assert_eq!(cache.stats().hits, 0);

        // A new contained parameter builds Observation again over published datatypes
        cache
            .resource(ResourceKind::Observation, ShapeOptions::forbid_contained())
            .unwrap();
        assert_eq!(cache.stats().hits, 0);

        cache
            .resource(ResourceKind::Patient, ShapeOptions::default())
            .unwrap();
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = ValidationConfig::default().with_max_recursion_depth(0);
        assert!(matches!(
            SchemaCache::with_config(config),
            Err(FhirShapeError::Config { .. })
        ));
    }
}
