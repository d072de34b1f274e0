//! Array-backed binary min-heap parameterised over its ordering function.
//!
//! The merge engine keeps one head entry per open partition in here and pops
//! the smallest key each step. Ties between equal elements come out in no
//! particular order; callers detect equality themselves after popping.

use std::cmp::Ordering;
use std::fmt;

pub struct MinHeap<T, C> {
    items: Vec<T>,
    cmp: C,
}

impl<T: Ord> MinHeap<T, fn(&T, &T) -> Ordering> {
    /// A heap ordered by `T`'s own `Ord`.
    pub fn natural() -> Self {
        Self::new(T::cmp)
    }
}

impl<T, C> MinHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    pub fn new(cmp: C) -> Self {
        Self { items: Vec::new(), cmp }
    }

    pub fn with_capacity(capacity: usize, cmp: C) -> Self {
        Self { items: Vec::with_capacity(capacity), cmp }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Removes the smallest element, `None` when the heap is empty.
    pub fn pop(&mut self) -> Option<T> {
        let last = self.items.len().checked_sub(1)?;
        self.items.swap(0, last);
        let top = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        top
    }

    fn less(&self, a: usize, b: usize) -> bool {
        (self.cmp)(&self.items[a], &self.items[b]) == Ordering::Less
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.items.len();
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let child = if right < n && self.less(right, left) { right } else { left };
            if !self.less(child, i) {
                break;
            }
            self.items.swap(i, child);
            i = child;
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for MinHeap<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinHeap").field("items", &self.items).finish()
    }
}
