//! The pull protocol every pipeline stage implements, plus the sources and
//! intermediate stages built on it.
//!
//! A stage owns its upstream and is consumed exactly once, either as a single
//! ordered iterator (`pull`) or as a stream of ordered chunks (`split`) that
//! workers evaluate independently. Stateless stages wrap each chunk so the
//! work runs on whichever worker pulls the chunk. Order-sensitive stages pull
//! their upstream in order and re-chunk the output.

use crate::batch::Batches;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::hash::Hash;
use std::sync::Arc;

pub(crate) type BoxIter<T> = Box<dyn Iterator<Item = T> + Send>;
pub(crate) type Chunks<T> = BoxIter<BoxIter<T>>;

pub(crate) type SharedPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub(crate) type OrderedPredicate<T> = Box<dyn FnMut(&T) -> bool + Send>;

pub(crate) trait Stage<T>: Send {
    /// Ordered, element-by-element evaluation.
    fn pull(self: Box<Self>) -> BoxIter<T>;

    /// Ordered chunks of at most `chunk_size` upstream elements each.
    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T>;

    /// Upper bound on the number of elements, `None` when unbounded or unknown.
    fn len_bound(&self) -> Option<usize>;
}

fn split_in_order<T: Send + 'static>(iter: BoxIter<T>, chunk_size: usize) -> Chunks<T> {
    Box::new(
        Batches::new(iter, chunk_size).map(|batch| Box::new(batch.into_iter()) as BoxIter<T>),
    )
}

// =============================================================================
// Sources
// =============================================================================

/// Any iterator as the head of a pipeline.
pub(crate) struct Source<I> {
    iter: I,
}

impl<I> Source<I> {
    pub(crate) fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I> Stage<I::Item> for Source<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    fn pull(self: Box<Self>) -> BoxIter<I::Item> {
        Box::new(self.iter)
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<I::Item> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        self.iter.size_hint().1
    }
}

/// Seed followed by repeated applications of a successor, for as long as the
/// continuation predicate accepts the current value.
///
/// The successor runs only when the next element is pulled, never ahead.
pub(crate) struct Iterate<T, F, P> {
    seed: Option<T>,
    last: Option<T>,
    successor: F,
    predicate: P,
    finished: bool,
}

impl<T, F, P> Iterate<T, F, P>
where
    F: FnMut(&T) -> T,
    P: FnMut(&T) -> bool,
{
    pub(crate) fn new(seed: T, predicate: P, successor: F) -> Self {
        Self {
            seed: Some(seed),
            last: None,
            successor,
            predicate,
            finished: false,
        }
    }
}

impl<T, F, P> Iterator for Iterate<T, F, P>
where
    T: Clone,
    F: FnMut(&T) -> T,
    P: FnMut(&T) -> bool,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        let value = match self.seed.take() {
            Some(seed) => seed,
            None => (self.successor)(self.last.as_ref()?),
        };
        if !(self.predicate)(&value) {
            self.finished = true;
            self.last = None;
            return None;
        }
        self.last = Some(value.clone());
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

// =============================================================================
// Stateless stages: evaluated per chunk in parallel mode
// =============================================================================

pub(crate) struct Filter<T> {
    upstream: Box<dyn Stage<T>>,
    predicate: SharedPredicate<T>,
}

impl<T> Filter<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>, predicate: SharedPredicate<T>) -> Self {
        Self {
            upstream,
            predicate,
        }
    }
}

impl<T: Send + 'static> Stage<T> for Filter<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let predicate = self.predicate;
        Box::new(self.upstream.pull().filter(move |item| predicate(item)))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        let predicate = self.predicate;
        Box::new(self.upstream.split(chunk_size).map(move |chunk| {
            let predicate = Arc::clone(&predicate);
            Box::new(chunk.filter(move |item| predicate(item))) as BoxIter<T>
        }))
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}

pub(crate) struct Map<U, T> {
    upstream: Box<dyn Stage<U>>,
    mapper: Arc<dyn Fn(U) -> T + Send + Sync>,
}

impl<U, T> Map<U, T> {
    pub(crate) fn new(upstream: Box<dyn Stage<U>>, mapper: Arc<dyn Fn(U) -> T + Send + Sync>) -> Self {
        Self { upstream, mapper }
    }
}

impl<U: Send + 'static, T: Send + 'static> Stage<T> for Map<U, T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let mapper = self.mapper;
        Box::new(self.upstream.pull().map(move |item| mapper(item)))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        let mapper = self.mapper;
        Box::new(self.upstream.split(chunk_size).map(move |chunk| {
            let mapper = Arc::clone(&mapper);
            Box::new(chunk.map(move |item| mapper(item))) as BoxIter<T>
        }))
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}

pub(crate) struct FlatMap<U, T> {
    upstream: Box<dyn Stage<U>>,
    mapper: Arc<dyn Fn(U) -> BoxIter<T> + Send + Sync>,
}

impl<U, T> FlatMap<U, T> {
    pub(crate) fn new(
        upstream: Box<dyn Stage<U>>,
        mapper: Arc<dyn Fn(U) -> BoxIter<T> + Send + Sync>,
    ) -> Self {
        Self { upstream, mapper }
    }
}

impl<U: Send + 'static, T: Send + 'static> Stage<T> for FlatMap<U, T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let mapper = self.mapper;
        Box::new(self.upstream.pull().flat_map(move |item| mapper(item)))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        let mapper = self.mapper;
        Box::new(self.upstream.split(chunk_size).map(move |chunk| {
            let mapper = Arc::clone(&mapper);
            Box::new(chunk.flat_map(move |item| mapper(item))) as BoxIter<T>
        }))
    }

    fn len_bound(&self) -> Option<usize> {
        None
    }
}

pub(crate) struct Peek<T> {
    upstream: Box<dyn Stage<T>>,
    action: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Peek<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>, action: Arc<dyn Fn(&T) + Send + Sync>) -> Self {
        Self { upstream, action }
    }
}

impl<T: Send + 'static> Stage<T> for Peek<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let action = self.action;
        Box::new(self.upstream.pull().inspect(move |item| action(item)))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        let action = self.action;
        Box::new(self.upstream.split(chunk_size).map(move |chunk| {
            let action = Arc::clone(&action);
            Box::new(chunk.inspect(move |item| action(item))) as BoxIter<T>
        }))
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}

// =============================================================================
// Order-sensitive stages: upstream always pulled in encounter order
// =============================================================================

pub(crate) struct Limit<T> {
    upstream: Box<dyn Stage<T>>,
    max: usize,
}

impl<T> Limit<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>, max: usize) -> Self {
        Self { upstream, max }
    }
}

impl<T: Send + 'static> Stage<T> for Limit<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        Box::new(self.upstream.pull().take(self.max))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        Some(
            self.upstream
                .len_bound()
                .map_or(self.max, |len| len.min(self.max)),
        )
    }
}

pub(crate) struct Skip<T> {
    upstream: Box<dyn Stage<T>>,
    count: usize,
}

impl<T> Skip<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>, count: usize) -> Self {
        Self { upstream, count }
    }
}

impl<T: Send + 'static> Stage<T> for Skip<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        Box::new(self.upstream.pull().skip(self.count))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream
            .len_bound()
            .map(|len| len.saturating_sub(self.count))
    }
}

pub(crate) struct Distinct<T> {
    upstream: Box<dyn Stage<T>>,
}

impl<T> Distinct<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>) -> Self {
        Self { upstream }
    }
}

impl<T> Stage<T> for Distinct<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let mut seen = FxHashSet::default();
        Box::new(
            self.upstream
                .pull()
                .filter(move |item| seen.insert(item.clone())),
        )
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}

pub(crate) struct TakeWhile<T> {
    upstream: Box<dyn Stage<T>>,
    predicate: OrderedPredicate<T>,
}

impl<T> TakeWhile<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>, predicate: OrderedPredicate<T>) -> Self {
        Self {
            upstream,
            predicate,
        }
    }
}

impl<T: Send + 'static> Stage<T> for TakeWhile<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let mut predicate = self.predicate;
        Box::new(self.upstream.pull().take_while(move |item| predicate(item)))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}

pub(crate) struct DropWhile<T> {
    upstream: Box<dyn Stage<T>>,
    predicate: OrderedPredicate<T>,
}

impl<T> DropWhile<T> {
    pub(crate) fn new(upstream: Box<dyn Stage<T>>, predicate: OrderedPredicate<T>) -> Self {
        Self {
            upstream,
            predicate,
        }
    }
}

impl<T: Send + 'static> Stage<T> for DropWhile<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let mut predicate = self.predicate;
        Box::new(self.upstream.pull().skip_while(move |item| predicate(item)))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}

/// Stable sort. Materialises the whole upstream on the first pull.
pub(crate) struct Sorted<T> {
    upstream: Box<dyn Stage<T>>,
    compare: Box<dyn FnMut(&T, &T) -> Ordering + Send>,
}

impl<T> Sorted<T> {
    pub(crate) fn new(
        upstream: Box<dyn Stage<T>>,
        compare: Box<dyn FnMut(&T, &T) -> Ordering + Send>,
    ) -> Self {
        Self { upstream, compare }
    }
}

impl<T: Send + 'static> Stage<T> for Sorted<T> {
    fn pull(self: Box<Self>) -> BoxIter<T> {
        let mut upstream = Some(self.upstream);
        let mut compare = self.compare;
        Box::new(std::iter::once(()).flat_map(move |()| {
            let mut items: Vec<T> = upstream
                .take()
                .map(|stage| stage.pull().collect())
                .unwrap_or_default();
            items.sort_by(|a, b| compare(a, b));
            items
        }))
    }

    fn split(self: Box<Self>, chunk_size: usize) -> Chunks<T> {
        split_in_order(self.pull(), chunk_size)
    }

    fn len_bound(&self) -> Option<usize> {
        self.upstream.len_bound()
    }
}
