//! Parallel processing utilities for the batch cost pass
//!
//! This module provides configurable thread pool management. Only the
//! initial cost evaluation runs in parallel; the collapse loop is
//! sequential.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, Mutex, OnceLock};
use lodcrate_core::{Error, Result};

/// Global thread pool used for simplification work
static GLOBAL_THREAD_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static THREAD_POOL_CONFIG: Mutex<ThreadPoolConfig> = Mutex::new(ThreadPoolConfig::new());

/// Thread pool configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of threads to use (None = rayon default)
    pub num_threads: Option<usize>,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Inputs smaller than this run sequentially; also the smallest batch chunk
    pub min_chunk_size: usize,
    /// Largest batch chunk between cancellation checks
    pub max_chunk_size: usize,
}

impl ThreadPoolConfig {
    const fn new() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            thread_name_prefix: String::new(),
            enabled: true,
            min_chunk_size: 256,
            max_chunk_size: 16384,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set chunk size range
    pub fn with_chunk_size_range(mut self, min: usize, max: usize) -> Self {
        self.min_chunk_size = min.max(1);
        self.max_chunk_size = max.max(self.min_chunk_size);
        self
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "lodcrate-simplify".to_string(),
            ..Self::new()
        }
    }
}

/// Initialize the global thread pool with custom configuration.
///
/// Only the first successful call builds a pool; later calls just update
/// the chunking and enable settings.
pub fn init_thread_pool(config: ThreadPoolConfig) -> Result<()> {
    if GLOBAL_THREAD_POOL.get().is_none() {
        let mut builder = ThreadPoolBuilder::new();

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }

        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        if !config.thread_name_prefix.is_empty() {
            let prefix = config.thread_name_prefix.clone();
            builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
        }

        let pool = builder
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))?;

        // Another thread may have won the race; its pool is equally usable
        let _ = GLOBAL_THREAD_POOL.set(Arc::new(pool));
    }

    if let Ok(mut global_config) = THREAD_POOL_CONFIG.lock() {
        *global_config = config;
    }

    Ok(())
}

/// Get current thread pool configuration
pub fn get_config() -> ThreadPoolConfig {
    THREAD_POOL_CONFIG
        .lock()
        .map(|config| config.clone())
        .unwrap_or_else(|_| ThreadPoolConfig::default())
}

/// Check if parallel processing is enabled
pub fn is_parallel_enabled() -> bool {
    get_config().enabled
}

/// Number of worker threads parallel work will be spread over
pub fn current_num_threads() -> usize {
    match GLOBAL_THREAD_POOL.get() {
        Some(pool) => pool.current_num_threads(),
        None => rayon::current_num_threads(),
    }
}

/// Compute a chunk size for `data_size` items, aiming for four chunks per thread
pub fn compute_chunk_size(data_size: usize) -> usize {
    let config = get_config();
    let base_chunk_size = data_size / (current_num_threads() * 4).max(1);

    base_chunk_size
        .max(config.min_chunk_size)
        .min(config.max_chunk_size)
}

/// Execute a parallel operation on the configured pool (rayon's global pool
/// if none was initialized)
pub fn execute_parallel<F, R>(op: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match GLOBAL_THREAD_POOL.get() {
        Some(pool) if is_parallel_enabled() => pool.install(op),
        _ => op(),
    }
}

/// Parallel map preserving input order
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    let config = get_config();
    if !config.enabled || data.len() < config.min_chunk_size {
        return data.iter().map(f).collect();
    }

    execute_parallel(|| data.par_iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_pool_config() {
        let config = ThreadPoolConfig::default()
            .with_threads(4)
            .with_stack_size(16 * 1024 * 1024)
            .with_enabled(true);

        assert_eq!(config.num_threads, Some(4));
        assert_eq!(config.stack_size, Some(16 * 1024 * 1024));
        assert!(config.enabled);
        assert_eq!(config.thread_name_prefix, "lodcrate-simplify");
    }

    #[test]
    fn test_chunk_size_range_is_ordered() {
        let config = ThreadPoolConfig::default().with_chunk_size_range(0, 0);
        assert_eq!(config.min_chunk_size, 1);
        assert_eq!(config.max_chunk_size, 1);
    }

    #[test]
    fn test_chunk_size_computation() {
        let chunk_size = compute_chunk_size(1_000_000);
        let config = get_config();

        assert!(chunk_size >= config.min_chunk_size);
        assert!(chunk_size <= config.max_chunk_size);
    }

    #[test]
    fn test_parallel_map_small_and_large() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(parallel_map(&data, |x| x * 2), vec![2, 4, 6, 8, 10]);

        let large: Vec<usize> = (0..10_000).collect();
        let mapped = parallel_map(&large, |x| x + 1);
        assert_eq!(mapped.len(), large.len());
        assert!(mapped.iter().enumerate().all(|(i, &v)| v == i + 1));
    }
}
