//! Parallel processing utilities for the reconstruction pipeline
//!
//! Per-label work runs on a rayon pool. Results are always collected in
//! input order, so a parallel run produces exactly what a sequential run
//! would.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use segmesh_core::{Error, Result};

/// Thread pool configuration for parallel processing
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelConfig {
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Number of threads to use (None = rayon's global pool)
    pub num_threads: Option<usize>,
    /// Thread name prefix for dedicated pools
    pub thread_name_prefix: String,
    /// Inputs shorter than this run sequentially
    pub min_parallel_len: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_threads: None,
            thread_name_prefix: "segmesh-recon".to_string(),
            min_parallel_len: 2,
        }
    }
}

impl ParallelConfig {
    /// Sequential configuration
    pub fn sequential() -> Self {
        Self::default().with_enabled(false)
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the minimum input length that is worth splitting
    pub fn with_min_parallel_len(mut self, min_parallel_len: usize) -> Self {
        self.min_parallel_len = min_parallel_len;
        self
    }

    /// Build a dedicated thread pool from this configuration
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new();

        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }

        if !self.thread_name_prefix.is_empty() {
            let prefix = self.thread_name_prefix.clone();
            builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
        }

        builder
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))
    }

    /// Run `op` inside a dedicated pool when a thread count is configured,
    /// otherwise on the calling thread (and rayon's global pool)
    pub fn install<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match (self.enabled, self.num_threads) {
            (true, Some(_)) => Ok(self.build_pool()?.install(op)),
            _ => Ok(op()),
        }
    }
}

/// Order-preserving parallel map
pub fn parallel_map<T, U, F>(config: &ParallelConfig, data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    if !config.enabled || data.len() < config.min_parallel_len {
        return data.iter().map(f).collect();
    }

    data.par_iter().map(f).collect()
}

/// Order-preserving parallel map over `0..len`
pub fn parallel_map_range<U, F>(config: &ParallelConfig, len: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    if !config.enabled || len < config.min_parallel_len {
        return (0..len).map(f).collect();
    }

    (0..len).into_par_iter().map(f).collect()
}
