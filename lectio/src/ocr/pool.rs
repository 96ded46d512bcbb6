//! Cache of built recognition engines.
//!
//! Engines are keyed by language and the engine-relevant part of their
//! [`EngineConfig`], so a request with different tunables gets its own engine
//! instead of mutating a shared one. The map lock is held only for lookups and
//! inserts; building and recognition happen outside it.

use image::RgbImage;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{LectioError, Result};

use super::engine::{EngineFactory, RawRegion, RecognitionEngine};
use super::language::{resolve_language, LanguageKey};
use super::params::{EngineConfig, EngineKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PoolKey {
    language: LanguageKey,
    engine: EngineKey,
}

/// A built engine handed out by [`EnginePool`].
///
/// Only the pool constructs these. Handles stay usable after the pool evicts
/// them; the engine is dropped once the last in-flight request finishes.
pub struct PooledEngine {
    language: LanguageKey,
    config: EngineConfig,
    generation: u64,
    engine: Box<dyn RecognitionEngine>,
}

impl PooledEngine {
    pub fn language(&self) -> LanguageKey {
        self.language
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pool generation this engine was built under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn run(&self, image: &RgbImage) -> Result<Vec<RawRegion>> {
        self.engine.detect_and_recognize(image)
    }
}

impl std::fmt::Debug for PooledEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledEngine")
            .field("language", &self.language)
            .field("config", &self.config)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

struct PoolState {
    base: EngineConfig,
    generation: u64,
    engines: LruCache<PoolKey, Arc<PooledEngine>>,
    /// One lock per key with a build in progress.
    building: HashMap<PoolKey, Arc<Mutex<()>>>,
}

#[derive(Clone)]
pub struct EnginePool {
    factory: Arc<dyn EngineFactory>,
    state: Arc<Mutex<PoolState>>,
}

impl EnginePool {
    pub fn new(factory: Arc<dyn EngineFactory>, base: EngineConfig, capacity: usize) -> Result<Self> {
        base.validate()?;
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| LectioError::Config("engine pool capacity must be at least 1".to_string()))?;

        Ok(Self {
            factory,
            state: Arc::new(Mutex::new(PoolState {
                base,
                generation: 0,
                engines: LruCache::new(capacity),
                building: HashMap::new(),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend(&self) -> &'static str {
        self.factory.name()
    }

    pub fn resolve_language(&self, requested: &str) -> LanguageKey {
        resolve_language(requested)
    }

    pub fn base_config(&self) -> EngineConfig {
        self.lock().base
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn cached_engines(&self) -> usize {
        self.lock().engines.len()
    }

    /// Engine for `language` under the base config.
    pub fn get(&self, language: LanguageKey) -> Result<Arc<PooledEngine>> {
        let base = self.base_config();
        self.get_with(language, &base)
    }

    /// Engine for `language` under an explicit, already validated config.
    ///
    /// Concurrent misses on the same key wait for a single build.
    pub fn get_with(&self, language: LanguageKey, config: &EngineConfig) -> Result<Arc<PooledEngine>> {
        let key = PoolKey {
            language,
            engine: config.engine_key(),
        };

        let build_lock = {
            let mut state = self.lock();
            if let Some(engine) = state.engines.get(&key) {
                return Ok(Arc::clone(engine));
            }
            Arc::clone(state.building.entry(key).or_default())
        };

        let _building = build_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = {
            let mut state = self.lock();
            if let Some(engine) = state.engines.get(&key) {
                return Ok(Arc::clone(engine));
            }
            state.generation
        };

        let result = self.build(language, config, generation);

        let mut state = self.lock();
        if state
            .building
            .get(&key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &build_lock))
        {
            state.building.remove(&key);
        }
        let built = result?;

        if state.generation != generation {
            // Overrides were applied while building; serve this request but
            // keep the stale engine out of the cache.
            debug!(language = %language, "Discarding engine built under a previous generation");
            return Ok(built);
        }
        if let Some((evicted, _)) = state.engines.push(key, Arc::clone(&built)) {
            if evicted != key {
                debug!(language = %evicted.language, "Evicted least recently used OCR engine");
            }
        }
        Ok(built)
    }

    fn build(&self, language: LanguageKey, config: &EngineConfig, generation: u64) -> Result<Arc<PooledEngine>> {
        info!(
            language = %language,
            backend = self.factory.name(),
            char_type = %config.char_type,
            "Building OCR engine"
        );
        let start = Instant::now();
        let engine = self.factory.build(language, config)?;
        info!(
            language = %language,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR engine ready"
        );

        Ok(Arc::new(PooledEngine {
            language,
            config: *config,
            generation,
            engine,
        }))
    }

    /// Derives a new base config from the current one and drops every cached
    /// engine. The read and the write happen under one lock.
    pub fn update<F>(&self, derive: F) -> Result<EngineConfig>
    where
        F: FnOnce(&EngineConfig) -> EngineConfig,
    {
        let mut state = self.lock();
        let config = derive(&state.base);
        config.validate()?;

        let dropped = state.engines.len();
        state.base = config;
        state.generation += 1;
        state.engines.clear();

        info!(
            generation = state.generation,
            dropped,
            "Applied engine config, cached engines cleared"
        );
        Ok(config)
    }

    /// Replaces the base config and drops every cached engine.
    pub fn apply_overrides(&self, config: EngineConfig) -> Result<()> {
        self.update(|_| config).map(|_| ())
    }

    /// Builds engines for `languages` under the base config ahead of the first request.
    pub fn warmup(&self, languages: &[LanguageKey]) -> Result<()> {
        for &language in languages {
            self.get(language)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullEngine;

    impl RecognitionEngine for NullEngine {
        fn detect_and_recognize(&self, _image: &RgbImage) -> Result<Vec<RawRegion>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl EngineFactory for CountingFactory {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn build(&self, _language: LanguageKey, _config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullEngine))
        }
    }

    struct BrokenFactory;

    impl EngineFactory for BrokenFactory {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn build(&self, _language: LanguageKey, _config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
            Err(LectioError::Recognition("model file not found".to_string()))
        }
    }

    fn pool_with(capacity: usize) -> (EnginePool, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::default());
        let pool = EnginePool::new(factory.clone(), EngineConfig::default(), capacity).unwrap();
        (pool, factory)
    }

    #[test]
    fn test_get_returns_cached_instance() {
        let (pool, factory) = pool_with(8);

        let first = pool.get(LanguageKey::Ch).unwrap();
        let second = pool.get(LanguageKey::Ch).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(pool.cached_engines(), 1);
    }

    #[test]
    fn test_languages_get_separate_engines() {
        let (pool, factory) = pool_with(8);

        let ch = pool.get(LanguageKey::Ch).unwrap();
        let en = pool.get(LanguageKey::En).unwrap();

        assert!(!Arc::ptr_eq(&ch, &en));
        assert_eq!(en.language(), LanguageKey::En);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_apply_overrides_forces_rebuild() {
        let (pool, _) = pool_with(8);
        let before = pool.get(LanguageKey::En).unwrap();

        let config = EngineConfig {
            box_thresh: 0.6,
            ..EngineConfig::default()
        };
        pool.apply_overrides(config).unwrap();
        let after = pool.get(LanguageKey::En).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.config().box_thresh, 0.6);
        assert_eq!(after.generation(), 1);
        assert_eq!(pool.base_config(), config);
    }

    #[test]
    fn test_reapplying_same_config_still_rebuilds() {
        let (pool, factory) = pool_with(8);
        pool.get(LanguageKey::Ch).unwrap();

        pool.apply_overrides(EngineConfig::default()).unwrap();
        pool.get(LanguageKey::Ch).unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_overrides_are_rejected_without_side_effects() {
        let (pool, _) = pool_with(8);
        let cached = pool.get(LanguageKey::Ch).unwrap();

        let bad = EngineConfig {
            drop_score: 2.0,
            ..EngineConfig::default()
        };
        assert!(matches!(pool.apply_overrides(bad), Err(LectioError::Config(_))));

        assert_eq!(pool.generation(), 0);
        assert!(Arc::ptr_eq(&cached, &pool.get(LanguageKey::Ch).unwrap()));
    }

    #[test]
    fn test_request_config_does_not_touch_base() {
        let (pool, factory) = pool_with(8);
        let custom = EngineConfig {
            unclip_ratio: 2.5,
            ..EngineConfig::default()
        };

        let tuned = pool.get_with(LanguageKey::Ch, &custom).unwrap();
        let default = pool.get(LanguageKey::Ch).unwrap();

        assert!(!Arc::ptr_eq(&tuned, &default));
        assert_eq!(pool.base_config(), EngineConfig::default());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preprocess_flag_shares_engine() {
        let (pool, factory) = pool_with(8);
        let no_pre = EngineConfig {
            preprocess: false,
            ..EngineConfig::default()
        };

        let a = pool.get(LanguageKey::En).unwrap();
        let b = pool.get_with(LanguageKey::En, &no_pre).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let (pool, factory) = pool_with(1);

        let ch = pool.get(LanguageKey::Ch).unwrap();
        pool.get(LanguageKey::En).unwrap();
        assert_eq!(pool.cached_engines(), 1);

        let ch_again = pool.get(LanguageKey::Ch).unwrap();
        assert!(!Arc::ptr_eq(&ch, &ch_again));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
        // The evicted handle still works.
        assert!(ch.run(&RgbImage::new(1, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_build_failure_is_recognition_error_and_not_cached() {
        let pool = EnginePool::new(Arc::new(BrokenFactory), EngineConfig::default(), 8).unwrap();

        let err = pool.get(LanguageKey::Ch).unwrap_err();
        assert!(matches!(err, LectioError::Recognition(_)));
        assert_eq!(pool.cached_engines(), 0);
    }

    #[test]
    fn test_zero_capacity_is_config_error() {
        let result = EnginePool::new(Arc::new(BrokenFactory), EngineConfig::default(), 0);
        assert!(matches!(result, Err(LectioError::Config(_))));
    }

    #[test]
    fn test_warmup_builds_requested_languages() {
        let (pool, factory) = pool_with(8);

        pool.warmup(&LanguageKey::ALL).unwrap();

        assert_eq!(pool.cached_engines(), 2);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    struct SlowFactory {
        builds: AtomicUsize,
    }

    impl EngineFactory for SlowFactory {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn build(&self, _language: LanguageKey, _config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(100));
            Ok(Box::new(NullEngine))
        }
    }

    #[test]
    fn test_concurrent_cold_gets_build_once() {
        let factory = Arc::new(SlowFactory {
            builds: AtomicUsize::new(0),
        });
        let pool = EnginePool::new(factory.clone(), EngineConfig::default(), 8).unwrap();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    pool.get(LanguageKey::Ch).unwrap()
                })
            })
            .collect();
        let engines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
        assert_eq!(pool.cached_engines(), 1);
    }

    #[test]
    fn test_different_keys_build_independently() {
        let factory = Arc::new(SlowFactory {
            builds: AtomicUsize::new(0),
        });
        let pool = EnginePool::new(factory.clone(), EngineConfig::default(), 8).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| pool.get(LanguageKey::Ch).unwrap());
            s.spawn(|| pool.get(LanguageKey::En).unwrap());
        });

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        assert_eq!(pool.cached_engines(), 2);
    }

    #[test]
    fn test_update_merges_under_lock() {
        let (pool, _) = pool_with(8);

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    pool.update(|base| {
                        if i == 0 {
                            EngineConfig {
                                box_thresh: 0.6,
                                ..*base
                            }
                        } else {
                            EngineConfig {
                                max_text_length: 64,
                                ..*base
                            }
                        }
                    })
                    .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let base = pool.base_config();
        assert_eq!(base.box_thresh, 0.6);
        assert_eq!(base.max_text_length, 64);
        assert_eq!(pool.generation(), 2);
    }

    #[test]
    fn test_failed_build_releases_key() {
        let pool = EnginePool::new(Arc::new(BrokenFactory), EngineConfig::default(), 8).unwrap();

        assert!(pool.get(LanguageKey::En).is_err());
        assert!(pool.get(LanguageKey::En).is_err());
        assert!(pool.lock().building.is_empty());
    }
}
