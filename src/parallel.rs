//! Wave scheduler for parallel terminals.
//!
//! Chunks are pulled from the pipeline in encounter order and handed to the
//! worker pool a wave at a time. Results come back in chunk order, so a
//! terminal can merge them left to right and stop after any wave that already
//! decides its answer. Stopping between waves is what lets short-circuiting
//! terminals finish on unbounded sources.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::pool::worker_pool;
use crate::stage::{BoxIter, Chunks, Stage};
use rayon::prelude::*;
use rayon::ThreadPool;

pub(crate) struct Waves<T> {
    chunks: Chunks<T>,
    wave_size: usize,
    pool: &'static ThreadPool,
}

impl<T: Send + 'static> Waves<T> {
    pub(crate) fn new(stage: Box<dyn Stage<T>>, operation: &'static str) -> Result<Self> {
        Self::with_config(stage, operation, EngineConfig::global())
    }

    pub(crate) fn with_config(
        stage: Box<dyn Stage<T>>,
        operation: &'static str,
        config: &EngineConfig,
    ) -> Result<Self> {
        let pool = worker_pool()?;
        let len_bound = stage.len_bound();
        let chunk_size = config.chunk_size_for(len_bound);
        let wave_size = config.wave_size();
        if len_bound.is_none() {
            tracing::debug!(operation, "no length bound; relying on the terminal to stop");
        }
        tracing::debug!(operation, chunk_size, wave_size, "splitting pipeline");
        Ok(Self {
            chunks: stage.split(chunk_size),
            wave_size,
            pool,
        })
    }

    /// The next `wave_size` chunks, `None` once the pipeline is drained.
    pub(crate) fn next_wave(&mut self) -> Option<Vec<BoxIter<T>>> {
        let wave: Vec<BoxIter<T>> = self.chunks.by_ref().take(self.wave_size).collect();
        if wave.is_empty() {
            None
        } else {
            Some(wave)
        }
    }

    /// Runs `op` on every chunk of `wave`, results in chunk order.
    pub(crate) fn map<R, F>(&self, wave: Vec<BoxIter<T>>, op: F) -> Vec<R>
    where
        R: Send,
        F: Fn(BoxIter<T>) -> R + Send + Sync,
    {
        self.pool.install(|| wave.into_par_iter().map(op).collect())
    }

    /// True as soon as any chunk reports true; remaining chunks may be skipped.
    pub(crate) fn any<F>(&self, wave: Vec<BoxIter<T>>, op: F) -> bool
    where
        F: Fn(BoxIter<T>) -> bool + Send + Sync,
    {
        self.pool.install(|| wave.into_par_iter().any(op))
    }

    /// Whichever chunk produces a value first, without regard to order.
    pub(crate) fn find_map_any<R, F>(&self, wave: Vec<BoxIter<T>>, op: F) -> Option<R>
    where
        R: Send,
        F: Fn(BoxIter<T>) -> Option<R> + Send + Sync,
    {
        self.pool.install(|| wave.into_par_iter().find_map_any(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Source;

    fn config(chunk_size: usize, wave_chunks: usize) -> EngineConfig {
        EngineConfig {
            workers: 2,
            chunk_size: Some(chunk_size),
            wave_chunks_per_worker: wave_chunks,
        }
    }

    fn numbers(range: std::ops::Range<u32>) -> Box<dyn Stage<u32>> {
        Box::new(Source::new(range))
    }

    #[test]
    fn test_waves_cover_all_chunks_in_order() {
        let mut waves = Waves::with_config(numbers(0..10), "test", &config(2, 1)).unwrap();

        let mut sizes = Vec::new();
        let mut values = Vec::new();
        while let Some(wave) = waves.next_wave() {
            sizes.push(wave.len());
            for chunk in waves.map(wave, |chunk| chunk.collect::<Vec<_>>()) {
                values.extend(chunk);
            }
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_pipeline_has_no_waves() {
        let mut waves = Waves::with_config(numbers(0..0), "test", &config(4, 2)).unwrap();
        assert!(waves.next_wave().is_none());
    }

    #[test]
    fn test_any_on_wave() {
        let mut waves = Waves::with_config(numbers(0..8), "test", &config(2, 2)).unwrap();
        let wave = waves.next_wave().unwrap();
        assert!(waves.any(wave, |mut chunk| chunk.any(|x| x == 5)));
    }

    #[test]
    fn test_find_map_any_on_wave() {
        let mut waves = Waves::with_config(numbers(0..8), "test", &config(2, 2)).unwrap();
        let wave = waves.next_wave().unwrap();
        let found = waves.find_map_any(wave, |mut chunk| chunk.find(|x| x % 3 == 2));
        assert!(matches!(found, Some(2) | Some(5)));
    }
}
