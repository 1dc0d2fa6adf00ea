use crate::contract::Contract;
use crate::synth::ProxyType;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Key = (TypeId, bool);

/// Materialized proxy types, keyed by contract and by whether they carry an
/// observer. Safe to share between threads.
#[derive(Default)]
pub struct TypeCache {
    storage: DashMap<Key, Arc<dyn Any + Send + Sync>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached type for `C`, if any.
    pub fn get<C: Contract + ?Sized>(&self, observed: bool) -> Option<Arc<ProxyType<C>>> {
        let entry = self.storage.get(&(TypeId::of::<C>(), observed))?;
        Arc::clone(entry.value()).downcast::<ProxyType<C>>().ok()
    }

    /// Cache `ty` unless another thread got there first. Returns the type that
    /// ended up in the cache.
    pub fn insert<C: Contract + ?Sized>(
        &self,
        observed: bool,
        ty: Arc<ProxyType<C>>,
    ) -> Arc<ProxyType<C>> {
        let stored = Arc::clone(
            self.storage
                .entry((TypeId::of::<C>(), observed))
                .or_insert_with(|| ty.clone() as Arc<dyn Any + Send + Sync>)
                .value(),
        );
        stored.downcast::<ProxyType<C>>().unwrap_or(ty)
    }

    /// The cached type for `C`, synthesizing and caching it on a miss.
    ///
    /// `synthesize` runs without any lock held; if two threads miss at once
    /// both synthesize and the first insert wins.
    pub fn get_or_try_insert_with<C, E, F>(
        &self,
        observed: bool,
        synthesize: F,
    ) -> Result<Arc<ProxyType<C>>, E>
    where
        C: Contract + ?Sized,
        F: FnOnce() -> Result<ProxyType<C>, E>,
    {
        if let Some(ty) = self.get::<C>(observed) {
            debug!(type_name = %ty.name(), "Proxy type cache hit");
            return Ok(ty);
        }
        let ty = Arc::new(synthesize()?);
        Ok(self.insert(observed, ty))
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn clear(&self) {
        self.storage.clear();
    }
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("entries", &self.storage.len())
            .finish()
    }
}
