//! Ordered, immutable image list with wraparound index arithmetic.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;

/// One slide: an opaque source-defined id plus its display position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub id: String,
    pub index: usize,
}

/// The session's display order. Cheap to clone; never mutated after resolve.
#[derive(Debug, Clone, Default)]
pub struct ImageList {
    items: Arc<[ImageRef]>,
}

impl ImageList {
    /// Build a list from ids in display order.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let items: Vec<ImageRef> = ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| ImageRef { id, index })
            .collect();
        Self {
            items: items.into(),
        }
    }

    /// Shuffle once and re-index so that `index` still matches position.
    #[must_use]
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut ids: Vec<String> = self.items.iter().map(|r| r.id.clone()).collect();
        ids.shuffle(rng);
        Self::from_ids(ids)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ImageRef> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRef> {
        self.items.iter()
    }

    /// Index after `index`, wrapping to 0 at the end.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        self.offset(index, 1)
    }

    /// Index before `index`, wrapping to the last entry at 0.
    #[must_use]
    pub fn previous_index(&self, index: usize) -> usize {
        self.offset(index, -1)
    }

    #[must_use]
    pub fn offset(&self, index: usize, delta: isize) -> usize {
        let len = self.items.len();
        if len == 0 {
            return 0;
        }
        let len = len as isize;
        (index as isize + delta).rem_euclid(len) as usize
    }

    /// Indices to keep warm around `current`, most urgent first:
    /// the current index, then `ahead` forward, then `back` backward.
    /// Duplicates produced by wrapping on short lists are dropped.
    #[must_use]
    pub fn window(&self, current: usize, back: usize, ahead: usize) -> Vec<usize> {
        if self.items.is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let forward = (0..=ahead).map(|d| self.offset(current, d as isize));
        let backward = (1..=back).map(|d| self.offset(current, -(d as isize)));
        forward
            .chain(backward)
            .filter(|index| seen.insert(*index))
            .collect()
    }
}
