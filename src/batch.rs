/// Iterator adapter that cuts its upstream into consecutive batches of at
/// most `size` elements. Batches are produced on demand, in order.
pub struct Batches<I> {
    iter: I,
    size: usize,
}

impl<I: Iterator> Batches<I> {
    pub fn new(iter: I, size: usize) -> Self {
        assert!(size > 0, "batch size must be > 0");
        Self { iter, size }
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.iter.next()?;
        let expected = self.iter.size_hint().0.saturating_add(1);
        let mut batch = Vec::with_capacity(self.size.min(expected));
        batch.push(first);
        batch.extend(self.iter.by_ref().take(self.size - 1));
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.iter.size_hint();
        (
            lower.div_ceil(self.size),
            upper.map(|upper| upper.div_ceil(self.size)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let batches: Vec<_> = Batches::new(1..=6, 2).collect();
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_short_tail() {
        let batches: Vec<_> = Batches::new(1..=5, 3).collect();
        assert_eq!(batches, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_empty() {
        assert_eq!(Batches::new(std::iter::empty::<u8>(), 4).count(), 0);
    }

    #[test]
    fn test_lazy_over_unbounded() {
        let mut batches = Batches::new(0.., 10);
        assert_eq!(batches.next().unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(batches.next().unwrap()[0], 10);
    }

    #[test]
    fn test_huge_size_does_not_preallocate() {
        let mut batches = Batches::new(0..3, usize::MAX);
        assert_eq!(batches.next(), Some(vec![0, 1, 2]));
        assert_eq!(batches.next(), None);

        let mut unbounded = Batches::new((0..).take_while(|x| *x < 5), usize::MAX);
        assert_eq!(unbounded.next(), Some(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_size_hint() {
        let batches = Batches::new(vec![0; 7].into_iter(), 3);
        assert_eq!(batches.size_hint(), (3, Some(3)));
    }

    #[test]
    #[should_panic(expected = "batch size must be > 0")]
    fn test_zero_size_panics() {
        let _ = Batches::new(0..1, 0);
    }
}
