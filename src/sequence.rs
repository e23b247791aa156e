//! The `Sequence` handle: sources, intermediate stages, and the single-use
//! state machine every entry point goes through.

use crate::error::{Result, SequenceError};
use crate::stage::{
    BoxIter, Distinct, DropWhile, Filter, FlatMap, Iterate, Limit, Map, Peek, Skip, Sorted,
    Source, Stage, TakeWhile,
};
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Lifecycle of a sequence handle.
///
/// Only `Open` accepts operations; every other state answers with
/// [`SequenceError::ClosedSequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Open,
    /// A stage or mode switch took the pipeline into a new handle.
    Linked,
    /// A terminal operation ran.
    Consumed,
    /// An argument check failed.
    Invalid,
}

/// A lazy, single-use sequence of `T`.
///
/// Nothing is evaluated until a terminal operation runs. Stages and terminals
/// take `&mut self` and leave the handle closed, so reusing it is reported as
/// an error rather than prevented by the borrow checker.
pub struct Sequence<T> {
    pipeline: Option<Box<dyn Stage<T>>>,
    mode: ExecutionMode,
    state: SequenceState,
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Send + 'static> Sequence<T> {
    fn from_stage(stage: impl Stage<T> + 'static, mode: ExecutionMode) -> Self {
        Self::from_boxed(Box::new(stage), mode)
    }

    fn from_boxed(stage: Box<dyn Stage<T>>, mode: ExecutionMode) -> Self {
        Self {
            pipeline: Some(stage),
            mode,
            state: SequenceState::Open,
        }
    }

    // =========================================================================
    // Sources
    // =========================================================================

    /// Elements of an existing collection, in its iteration order. The
    /// collection's iterator is not advanced until a terminal pulls.
    pub fn from_collection<C>(collection: C) -> Self
    where
        C: IntoIterator<Item = T>,
        C::IntoIter: Send + 'static,
    {
        Self::from_stage(
            Source::new(collection.into_iter()),
            ExecutionMode::Sequential,
        )
    }

    /// Literal values in argument order. `Sequence::of([])` is empty.
    pub fn of<const N: usize>(values: [T; N]) -> Self {
        Self::from_stage(Source::new(values.into_iter()), ExecutionMode::Sequential)
    }

    pub fn empty() -> Self {
        Self::from_stage(Source::new(std::iter::empty::<T>()), ExecutionMode::Sequential)
    }

    /// Unbounded: every pull calls `supplier`.
    pub fn generate<F>(supplier: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Self::from_stage(
            Source::new(std::iter::repeat_with(supplier)),
            ExecutionMode::Sequential,
        )
    }

    /// Unbounded: `seed`, `successor(seed)`, `successor(successor(seed))`, ...
    pub fn iterate<F>(seed: T, successor: F) -> Self
    where
        T: Clone,
        F: FnMut(&T) -> T + Send + 'static,
    {
        Self::from_stage(
            Source::new(Iterate::new(seed, |_: &T| true, successor)),
            ExecutionMode::Sequential,
        )
    }

    /// Like [`Sequence::iterate`], but ends (without error) at the first value
    /// rejected by `predicate`. The seed is tested too.
    pub fn iterate_while<P, F>(seed: T, predicate: P, successor: F) -> Self
    where
        T: Clone,
        P: FnMut(&T) -> bool + Send + 'static,
        F: FnMut(&T) -> T + Send + 'static,
    {
        Self::from_stage(
            Source::new(Iterate::new(seed, predicate, successor)),
            ExecutionMode::Sequential,
        )
    }

    // =========================================================================
    // Handle state
    // =========================================================================

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_parallel(&self) -> bool {
        self.mode == ExecutionMode::Parallel
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SequenceState::Open => Ok(()),
            _ => Err(SequenceError::ClosedSequence),
        }
    }

    fn take_pipeline(&mut self, next: SequenceState) -> Result<Box<dyn Stage<T>>> {
        self.ensure_open()?;
        let pipeline = self
            .pipeline
            .take()
            .ok_or(SequenceError::ClosedSequence)?;
        self.state = next;
        Ok(pipeline)
    }

    fn link(&mut self) -> Result<(Box<dyn Stage<T>>, ExecutionMode)> {
        let pipeline = self.take_pipeline(SequenceState::Linked)?;
        Ok((pipeline, self.mode))
    }

    /// Closes the handle for a terminal operation.
    pub(crate) fn consume(
        &mut self,
        operation: &'static str,
    ) -> Result<(Box<dyn Stage<T>>, ExecutionMode)> {
        let pipeline = self.take_pipeline(SequenceState::Consumed)?;
        tracing::debug!(operation, mode = ?self.mode, "running terminal operation");
        Ok((pipeline, self.mode))
    }

    fn invalidate(&mut self, error: SequenceError) -> SequenceError {
        self.pipeline = None;
        self.state = SequenceState::Invalid;
        error
    }

    fn count_argument<N>(&mut self, operation: &'static str, n: N) -> Result<usize>
    where
        N: TryInto<usize> + Copy + fmt::Display,
    {
        self.ensure_open()?;
        n.try_into().map_err(|_| {
            self.invalidate(SequenceError::invalid_argument(
                operation,
                format!("count must be a non-negative value that fits in usize, got {n}"),
            ))
        })
    }

    // =========================================================================
    // Execution mode
    // =========================================================================

    pub fn parallel(&mut self) -> Result<Sequence<T>> {
        let (upstream, _) = self.link()?;
        Ok(Sequence::from_boxed(upstream, ExecutionMode::Parallel))
    }

    pub fn sequential(&mut self) -> Result<Sequence<T>> {
        let (upstream, _) = self.link()?;
        Ok(Sequence::from_boxed(upstream, ExecutionMode::Sequential))
    }

    // =========================================================================
    // Intermediate stages
    // =========================================================================

    pub fn filter<P>(&mut self, predicate: P) -> Result<Sequence<T>>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(
            Filter::new(upstream, Arc::new(predicate)),
            mode,
        ))
    }

    pub fn map<U, F>(&mut self, mapper: F) -> Result<Sequence<U>>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(Map::new(upstream, Arc::new(mapper)), mode))
    }

    pub fn flat_map<U, I, F>(&mut self, mapper: F) -> Result<Sequence<U>>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        I::IntoIter: Send + 'static,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        let (upstream, mode) = self.link()?;
        let mapper = move |item: T| Box::new(mapper(item).into_iter()) as BoxIter<U>;
        Ok(Sequence::from_stage(
            FlatMap::new(upstream, Arc::new(mapper)),
            mode,
        ))
    }

    /// Calls `action` on each element as it passes through.
    pub fn peek<F>(&mut self, action: F) -> Result<Sequence<T>>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(Peek::new(upstream, Arc::new(action)), mode))
    }

    /// First occurrence of each value, in encounter order.
    pub fn distinct(&mut self) -> Result<Sequence<T>>
    where
        T: Eq + Hash + Clone,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(Distinct::new(upstream), mode))
    }

    /// At most `max` elements. Bounds an unbounded sequence.
    pub fn limit<N>(&mut self, max: N) -> Result<Sequence<T>>
    where
        N: TryInto<usize> + Copy + fmt::Display,
    {
        let max = self.count_argument("limit", max)?;
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(Limit::new(upstream, max), mode))
    }

    pub fn skip<N>(&mut self, count: N) -> Result<Sequence<T>>
    where
        N: TryInto<usize> + Copy + fmt::Display,
    {
        let count = self.count_argument("skip", count)?;
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(Skip::new(upstream, count), mode))
    }

    pub fn take_while<P>(&mut self, predicate: P) -> Result<Sequence<T>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(
            TakeWhile::new(upstream, Box::new(predicate)),
            mode,
        ))
    }

    pub fn drop_while<P>(&mut self, predicate: P) -> Result<Sequence<T>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(
            DropWhile::new(upstream, Box::new(predicate)),
            mode,
        ))
    }

    /// Natural order. Needs a bounded upstream.
    pub fn sorted(&mut self) -> Result<Sequence<T>>
    where
        T: Ord,
    {
        self.sorted_by(|a: &T, b: &T| a.cmp(b))
    }

    /// Stable sort by `compare`. Needs a bounded upstream.
    pub fn sorted_by<F>(&mut self, compare: F) -> Result<Sequence<T>>
    where
        F: FnMut(&T, &T) -> Ordering + Send + 'static,
    {
        let (upstream, mode) = self.link()?;
        Ok(Sequence::from_stage(
            Sorted::new(upstream, Box::new(compare)),
            mode,
        ))
    }
}

/// Collects eagerly: `FromIterator` cannot require a `Send` iterator, so the
/// elements are buffered before the sequence is built. Use
/// [`Sequence::from_collection`] to keep the source lazy.
impl<T: Send + 'static> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<T> = iter.into_iter().collect();
        Sequence::from_collection(items)
    }
}

/// Builds a sequence from literal values: `sequence![1, 2, 3]`.
#[macro_export]
macro_rules! sequence {
    () => {
        $crate::Sequence::empty()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Sequence::of([$($value),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn test_new_sequence_is_open_and_sequential() {
        let seq = Sequence::of([1, 2, 3]);
        assert_eq!(seq.state(), SequenceState::Open);
        assert_eq!(seq.mode(), ExecutionMode::Sequential);
        assert!(!seq.is_parallel());
    }

    #[test]
    fn test_stage_links_the_old_handle() {
        let mut numbers = Sequence::iterate(10, |x| x + 2);
        let mut twenty = numbers.limit(20).unwrap();

        assert_eq!(numbers.state(), SequenceState::Linked);
        assert_eq!(
            numbers.limit(5).unwrap_err(),
            SequenceError::ClosedSequence
        );
        assert_eq!(twenty.count().unwrap(), 20);
    }

    #[test]
    fn test_terminal_closes_the_handle() {
        let mut twenty = Sequence::iterate(10, |x| x + 2).limit(20).unwrap();
        twenty.for_each(|_| {}).unwrap();

        assert_eq!(twenty.state(), SequenceState::Consumed);
        assert_eq!(twenty.count().unwrap_err(), SequenceError::ClosedSequence);
        assert_eq!(
            twenty.filter(|_| true).unwrap_err(),
            SequenceError::ClosedSequence
        );
        assert_eq!(twenty.parallel().unwrap_err(), SequenceError::ClosedSequence);
    }

    #[test]
    fn test_negative_limit_is_invalid() {
        let mut seq = Sequence::of([1, 2, 3]);
        let err = seq.limit(-1).unwrap_err();

        assert!(matches!(
            err,
            SequenceError::InvalidArgument { operation: "limit", .. }
        ));
        assert_eq!(seq.state(), SequenceState::Invalid);
        assert_eq!(seq.to_list().unwrap_err(), SequenceError::ClosedSequence);
    }

    #[test]
    fn test_negative_skip_is_invalid() {
        let err = Sequence::of([1, 2, 3]).skip(-4i64).unwrap_err();
        assert!(matches!(
            err,
            SequenceError::InvalidArgument { operation: "skip", .. }
        ));
    }

    #[test]
    fn test_oversized_count_is_invalid() {
        let err = Sequence::of([1, 2, 3]).limit(u128::MAX).unwrap_err();
        assert!(err.to_string().contains("fits in usize"));
        assert!(matches!(
            err,
            SequenceError::InvalidArgument { operation: "limit", .. }
        ));
    }

    #[test]
    fn test_closed_checked_before_arguments() {
        let mut seq = Sequence::of([1]);
        seq.count().unwrap();
        assert_eq!(seq.limit(-1).unwrap_err(), SequenceError::ClosedSequence);
    }

    #[test]
    fn test_limit_accepts_unsigned_counts() {
        let n: usize = 2;
        let values = Sequence::of([1, 2, 3]).limit(n).unwrap().to_list().unwrap();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_stages_are_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut seq = Sequence::generate(move || counter.fetch_add(1, AtomicOrdering::SeqCst))
            .map(|x| x * 2)
            .unwrap()
            .limit(3)
            .unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);

        assert_eq!(seq.to_list().unwrap(), vec![0, 2, 4]);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 3);
    }

    #[test]
    fn test_mode_switch_carries_through_stages() {
        let mut seq = Sequence::of([1, 2, 3]).parallel().unwrap();
        let mapped = seq.map(|x| x + 1).unwrap();
        assert!(mapped.is_parallel());
        assert_eq!(seq.state(), SequenceState::Linked);

        let back = Sequence::of([1]).parallel().unwrap().sequential().unwrap();
        assert_eq!(back.mode(), ExecutionMode::Sequential);
    }

    #[test]
    fn test_sequence_macro() {
        assert_eq!(sequence![1, 2, 3].to_list().unwrap(), vec![1, 2, 3]);
        assert_eq!(sequence![5].count().unwrap(), 1);
        let mut empty: Sequence<String> = sequence![];
        assert_eq!(empty.count().unwrap(), 0);
    }

    #[test]
    fn test_of_with_no_values_is_empty() {
        let mut empty = Sequence::<&str>::of([]);
        assert_eq!(empty.count().unwrap(), 0);
    }

    #[test]
    fn test_from_collection_is_lazy() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let mut seq = Sequence::from_collection((0..1000).inspect(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        }));
        assert_eq!(pulled.load(AtomicOrdering::SeqCst), 0);

        let mut first_three = seq.limit(3).unwrap();
        assert_eq!(pulled.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(first_three.to_list().unwrap(), vec![0, 1, 2]);
        assert_eq!(pulled.load(AtomicOrdering::SeqCst), 3);
    }

    #[test]
    fn test_from_iterator() {
        let mut seq: Sequence<u8> = (1..=4).collect();
        assert_eq!(seq.to_list().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_iterate_while_rejecting_seed_is_empty() {
        let mut seq = Sequence::iterate_while(50, |x| *x <= 48, |x| x + 2);
        assert_eq!(seq.count().unwrap(), 0);
    }

    #[test]
    fn test_flat_map_and_peek() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let values = Sequence::of(["a b", "c"])
            .flat_map(|line| line.split(' ').map(str::to_owned).collect::<Vec<_>>())
            .unwrap()
            .peek(move |_| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            })
            .unwrap()
            .to_list()
            .unwrap();
        assert_eq!(values, vec!["a", "b", "c"]);
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 3);
    }

    #[test]
    fn test_take_while_bounds_unbounded() {
        let values = Sequence::iterate(1, |x| x * 2)
            .take_while(|x| *x < 100)
            .unwrap()
            .to_list()
            .unwrap();
        assert_eq!(values, vec![1, 2, 4, 8, 16, 32, 64]);
    }

    #[test]
    fn test_drop_while() {
        let values = Sequence::of([1, 3, 6, 2, 7])
            .drop_while(|x| x % 2 == 1)
            .unwrap()
            .to_list()
            .unwrap();
        assert_eq!(values, vec![6, 2, 7]);
    }

    #[test]
    fn test_sorted() {
        let values = Sequence::of([5, 3, 9, 1]).sorted().unwrap().to_list().unwrap();
        assert_eq!(values, vec![1, 3, 5, 9]);

        let by_len = Sequence::of(["ccc", "a", "bb", "d"])
            .sorted_by(|a, b| a.len().cmp(&b.len()))
            .unwrap()
            .to_list()
            .unwrap();
        assert_eq!(by_len, vec!["a", "d", "bb", "ccc"]);
    }

    #[test]
    fn test_debug_shows_state() {
        let mut seq = Sequence::of([1]);
        seq.count().unwrap();
        let debug = format!("{:?}", seq);
        assert!(debug.contains("Consumed"));
    }
}
