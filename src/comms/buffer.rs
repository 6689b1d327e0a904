//! Fixed-capacity FIFO shared between many producers and many consumers.
//!
//! This module provides `BoundedBuffer`, a `VecDeque` behind a single `parking_lot`
//! mutex. The queue length read under that mutex is the only count of free slots and
//! ready items: polling callers (`try_insert`/`try_remove`) decide on it directly, and
//! blocking callers (`insert`/`remove`) park on one of two condition variables until it
//! permits their operation, then mutate without releasing the lock in between. Every
//! insertion signals `not_empty` and every removal signals `not_full` before the lock is
//! dropped, so a parked caller is woken as soon as its condition holds. Both disciplines
//! may share a buffer.
//!
//! The `*_with` variants run a commit hook under the same lock, right after the mutation,
//! so external accounting can move in the same critical section as the queue. `observe`
//! reads under that lock too.
use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::PileError;

#[derive(Debug)]
pub struct BoundedBuffer<T> {
    /// Queued values, oldest at the front.
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    /// Signaled once per removal.
    not_full: Condvar,
    /// Signaled once per insertion.
    not_empty: Condvar,
}

impl<T> BoundedBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` values.
    pub fn new(capacity: usize) -> Result<Self, PileError> {
        if capacity == 0 {
            return Err(PileError::ZeroCapacity);
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Appends `item` at the tail if a slot is free, without blocking.
    ///
    /// Returns the buffer length after the insertion, or hands `item` back when the
    /// buffer is full so the caller can retry the same value later.
    pub fn try_insert(&self, item: T) -> Result<usize, T> {
        self.try_insert_with(item, |_| {})
    }

    /// `try_insert`, running `on_commit(len_after)` under the lock when the item lands.
    pub fn try_insert_with<F>(&self, item: T, on_commit: F) -> Result<usize, T>
    where
        F: FnOnce(usize),
    {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        Ok(self.push_locked(&mut items, item, on_commit))
    }

    /// Removes the head item if there is one, without blocking.
    ///
    /// Returns the value together with the buffer length after the removal.
    pub fn try_remove(&self) -> Option<(T, usize)> {
        self.try_remove_with(|_| {})
    }

    pub fn try_remove_with<F: FnOnce(usize)>(&self, on_commit: F) -> Option<(T, usize)> {
        let mut items = self.items.lock();
        if items.is_empty() {
            return None;
        }
        Some(self.pop_locked(&mut items, on_commit))
    }

    /// Appends `item` at the tail, parking until a slot is free.
    pub fn insert(&self, item: T) -> usize {
        self.insert_with(item, |_| {})
    }

    pub fn insert_with<F: FnOnce(usize)>(&self, item: T, on_commit: F) -> usize {
        let mut items = self.items.lock();
        // re-checked after every wake: a polling inserter may have taken the slot
        while items.len() >= self.capacity {
            self.not_full.wait(&mut items);
        }
        self.push_locked(&mut items, item, on_commit)
    }

    /// Removes the head item, parking until one is available.
    pub fn remove(&self) -> (T, usize) {
        self.remove_with(|_| {})
    }

    pub fn remove_with<F: FnOnce(usize)>(&self, on_commit: F) -> (T, usize) {
        let mut items = self.items.lock();
        while items.is_empty() {
            self.not_empty.wait(&mut items);
        }
        self.pop_locked(&mut items, on_commit)
    }

    /// Current number of queued values.
    pub fn size(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs `f(len)` while holding the queue lock, so no mutation (or commit hook) can
    /// interleave with what `f` reads.
    pub fn observe<R, F: FnOnce(usize) -> R>(&self, f: F) -> R {
        let items = self.items.lock();
        f(items.len())
    }

    fn push_locked<F>(&self, items: &mut VecDeque<T>, item: T, on_commit: F) -> usize
    where
        F: FnOnce(usize),
    {
        assert!(
            items.len() < self.capacity,
            "BoundedBuffer admitted an insertion while holding {} of {} values, this indicates a bug.",
            items.len(),
            self.capacity
        );
        items.push_back(item);
        let len = items.len();
        on_commit(len);
        self.not_empty.notify_one();
        len
    }

    fn pop_locked<F>(&self, items: &mut VecDeque<T>, on_commit: F) -> (T, usize)
    where
        F: FnOnce(usize),
    {
        let Some(item) = items.pop_front() else {
            panic!("BoundedBuffer admitted a removal while empty, this indicates a bug.");
        };
        let len = items.len();
        on_commit(len);
        self.not_full.notify_one();
        (item, len)
    }
}
