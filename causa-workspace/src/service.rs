//! The per-context service cache: a constructor is invoked at most once
//! per context and its result reused on every subsequent call with the
//! same `T`. Owned by a single context; not shared across contexts even
//! when cloned.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

/// A `TypeId`-keyed cache of constructed service instances.
///
/// Identity is keyed by `T` rather than by the constructor closure
/// itself (closures have no stable identity in Rust); this means a
/// context can only ever hold one instance of a given `T`, a narrower
/// but equivalent "built once, reused" guarantee for every realistic use
/// (see DESIGN.md).
#[derive(Default)]
pub struct ServiceCache {
    instances: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ServiceCache {
    /// Builds an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached `T`, constructing it with `build` on first
    /// access.
    pub fn get_or_init<T, F>(&self, build: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut instances = self.instances.lock().expect("service cache mutex poisoned");
        let entry = instances
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(build()));
        entry
            .downcast_ref::<T>()
            .cloned()
            .expect("TypeId-keyed entry must downcast to its own type")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct Counter(Arc<AtomicUsize>);

    #[test]
    fn constructor_runs_once_per_type() {
        let cache = ServiceCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            cache.get_or_init(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Counter(Arc::new(AtomicUsize::new(0)))
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_types_are_cached_independently() {
        let cache = ServiceCache::new();
        let a: Counter = cache.get_or_init(|| Counter(Arc::new(AtomicUsize::new(1))));
        let b: i64 = cache.get_or_init(|| 42_i64);
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b, 42);
    }
}
