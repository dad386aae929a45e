// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy enumeration of bounded subsets.

/// Iterator over every subset of `items` with at most `max_size` elements.
///
/// Subsets are produced depth-first, each keeping the order of `items`, starting
/// with the empty subset. The size bound prunes generation: no subset larger than
/// `max_size` is ever built. Call [`BoundedPowerset::new`] again to restart.
#[derive(Debug, Clone)]
pub struct BoundedPowerset<'a, T> {
    items: &'a [T],
    max_size: usize,
    indices: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl<'a, T> BoundedPowerset<'a, T> {
    pub fn new(items: &'a [T], max_size: usize) -> Self {
        Self {
            items,
            max_size,
            indices: Vec::with_capacity(max_size.min(items.len())),
            started: false,
            exhausted: false,
        }
    }

    fn current(&self) -> Vec<&'a T> {
        self.indices.iter().map(|&i| &self.items[i]).collect()
    }
}

impl<'a, T> Iterator for BoundedPowerset<'a, T> {
    type Item = Vec<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(Vec::new());
        }

        if self.indices.len() < self.max_size {
            let next = self.indices.last().map_or(0, |last| last + 1);
            if next < self.items.len() {
                self.indices.push(next);
                return Some(self.current());
            }
        }

        while let Some(last) = self.indices.pop() {
            if last + 1 < self.items.len() {
                self.indices.push(last + 1);
                return Some(self.current());
            }
        }

        self.exhausted = true;
        None
    }
}
