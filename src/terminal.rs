//! Terminal operations. Each one closes the handle, then either pulls the
//! pipeline on the calling thread or fans its chunks out to the worker pool.
//!
//! Materialising terminals (`count`, `collect`, `for_each`, `reduce`, ...)
//! never return on an unbounded sequence. Bound it first with `limit` or
//! `take_while`, or use one of the short-circuiting terminals.

use crate::error::Result;
use crate::parallel::Waves;
use crate::sequence::{ExecutionMode, Sequence};
use crate::stage::BoxIter;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

/// Plain iterator over what remains of a consumed sequence.
pub struct SequenceIter<T> {
    inner: BoxIter<T>,
}

impl<T> Iterator for SequenceIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Send + 'static> Sequence<T> {
    /// Runs `action` on every element. Encounter order in sequential mode;
    /// unspecified in parallel mode, where the action runs on worker threads.
    pub fn for_each<F>(&mut self, action: F) -> Result<()>
    where
        F: Fn(T) + Send + Sync,
    {
        let (stage, mode) = self.consume("for_each")?;
        match mode {
            ExecutionMode::Sequential => stage.pull().for_each(action),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, "for_each")?;
                while let Some(wave) = waves.next_wave() {
                    waves.map(wave, |chunk| chunk.for_each(&action));
                }
            }
        }
        Ok(())
    }

    /// Runs `action` on every element in encounter order, on the calling
    /// thread. In parallel mode the upstream stages still run on workers.
    pub fn for_each_ordered<F>(&mut self, mut action: F) -> Result<()>
    where
        F: FnMut(T),
    {
        let (stage, mode) = self.consume("for_each_ordered")?;
        match mode {
            ExecutionMode::Sequential => stage.pull().for_each(action),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, "for_each_ordered")?;
                while let Some(wave) = waves.next_wave() {
                    for chunk in waves.map(wave, |chunk| chunk.collect::<Vec<T>>()) {
                        chunk.into_iter().for_each(&mut action);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn count(&mut self) -> Result<usize> {
        let (stage, mode) = self.consume("count")?;
        match mode {
            ExecutionMode::Sequential => Ok(stage.pull().count()),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, "count")?;
                let mut total = 0;
                while let Some(wave) = waves.next_wave() {
                    total += waves.map(wave, |chunk| chunk.count()).into_iter().sum::<usize>();
                }
                Ok(total)
            }
        }
    }

    /// Left fold of all elements with `op`; `None` when empty.
    ///
    /// Parallel mode folds each chunk separately and combines the partial
    /// results in chunk order, so `op` must be associative.
    pub fn reduce<F>(&mut self, op: F) -> Result<Option<T>>
    where
        F: Fn(T, T) -> T + Send + Sync,
    {
        self.reduce_named("reduce", op)
    }

    /// `identity op e1 op e2 ...`; returns `identity` for an empty sequence.
    pub fn reduce_with<F>(&mut self, identity: T, op: F) -> Result<T>
    where
        F: Fn(T, T) -> T + Send + Sync,
    {
        Ok(match self.reduce_named("reduce_with", &op)? {
            Some(folded) => op(identity, folded),
            None => identity,
        })
    }

    fn reduce_named<F>(&mut self, operation: &'static str, op: F) -> Result<Option<T>>
    where
        F: Fn(T, T) -> T + Send + Sync,
    {
        let (stage, mode) = self.consume(operation)?;
        match mode {
            ExecutionMode::Sequential => Ok(stage.pull().reduce(&op)),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, operation)?;
                let mut acc: Option<T> = None;
                while let Some(wave) = waves.next_wave() {
                    for partial in waves.map(wave, |chunk| chunk.reduce(&op)).into_iter().flatten() {
                        acc = Some(match acc {
                            Some(left) => op(left, partial),
                            None => partial,
                        });
                    }
                }
                Ok(acc)
            }
        }
    }

    /// Smallest element under `compare`; the first one wins a tie.
    pub fn min_by<F>(&mut self, compare: F) -> Result<Option<T>>
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync,
    {
        self.reduce_named("min", |current, candidate| {
            if compare(&candidate, &current) == Ordering::Less {
                candidate
            } else {
                current
            }
        })
    }

    /// Largest element under `compare`; the first one wins a tie.
    pub fn max_by<F>(&mut self, compare: F) -> Result<Option<T>>
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync,
    {
        self.reduce_named("max", |current, candidate| {
            if compare(&candidate, &current) == Ordering::Greater {
                candidate
            } else {
                current
            }
        })
    }

    pub fn min(&mut self) -> Result<Option<T>>
    where
        T: Ord,
    {
        self.min_by(|a: &T, b: &T| a.cmp(b))
    }

    pub fn max(&mut self) -> Result<Option<T>>
    where
        T: Ord,
    {
        self.max_by(|a: &T, b: &T| a.cmp(b))
    }

    /// First element in encounter order, in either mode.
    pub fn find_first(&mut self) -> Result<Option<T>> {
        let (stage, mode) = self.consume("find_first")?;
        match mode {
            ExecutionMode::Sequential => Ok(stage.pull().next()),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, "find_first")?;
                while let Some(wave) = waves.next_wave() {
                    let heads = waves.map(wave, |mut chunk| chunk.next());
                    if let Some(first) = heads.into_iter().flatten().next() {
                        return Ok(Some(first));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Some element, with no promise about which one.
    pub fn find_any(&mut self) -> Result<Option<T>> {
        let (stage, mode) = self.consume("find_any")?;
        match mode {
            ExecutionMode::Sequential => Ok(stage.pull().next()),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, "find_any")?;
                while let Some(wave) = waves.next_wave() {
                    if let Some(found) = waves.find_map_any(wave, |mut chunk| chunk.next()) {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Stops at the first element matching `predicate`.
    pub fn any_match<P>(&mut self, predicate: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.any_named("any_match", predicate)
    }

    /// Stops at the first element failing `predicate`. True when empty.
    pub fn all_match<P>(&mut self, predicate: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.any_named("all_match", |item: &T| !predicate(item))
            .map(|failed| !failed)
    }

    /// Stops at the first element matching `predicate`. True when empty.
    pub fn none_match<P>(&mut self, predicate: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.any_named("none_match", predicate).map(|found| !found)
    }

    fn any_named<P>(&mut self, operation: &'static str, predicate: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        let (stage, mode) = self.consume(operation)?;
        match mode {
            ExecutionMode::Sequential => Ok(stage.pull().any(|item| predicate(&item))),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, operation)?;
                while let Some(wave) = waves.next_wave() {
                    if waves.any(wave, |mut chunk| chunk.any(|item| predicate(&item))) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Gathers the elements into any `FromIterator` container, in encounter
    /// order for ordered containers.
    pub fn collect<C>(&mut self) -> Result<C>
    where
        C: FromIterator<T>,
    {
        let (stage, mode) = self.consume("collect")?;
        match mode {
            ExecutionMode::Sequential => Ok(stage.pull().collect()),
            ExecutionMode::Parallel => {
                let mut waves = Waves::new(stage, "collect")?;
                let mut parts: Vec<Vec<T>> = Vec::new();
                while let Some(wave) = waves.next_wave() {
                    parts.extend(waves.map(wave, |chunk| chunk.collect::<Vec<T>>()));
                }
                Ok(parts.into_iter().flatten().collect())
            }
        }
    }

    pub fn to_list(&mut self) -> Result<Vec<T>> {
        self.collect()
    }

    pub fn to_set(&mut self) -> Result<HashSet<T>>
    where
        T: Eq + Hash,
    {
        self.collect()
    }

    /// Hands the remaining elements back as a plain iterator. Always pulls
    /// on the caller's thread, whatever the mode.
    pub fn iter(&mut self) -> Result<SequenceIter<T>> {
        let (stage, _) = self.consume("iter")?;
        Ok(SequenceIter {
            inner: stage.pull(),
        })
    }
}
