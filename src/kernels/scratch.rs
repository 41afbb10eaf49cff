//! Thread-local pool of zeroed f32 scratch buffers.
//!
//! Recurrent kernels need the same gate and state buffers at every time step.
//! A [`ScratchBuffer`] returns its allocation to the pool on drop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

thread_local! {
    static POOL: RefCell<VecDeque<Vec<f32>>> = const { RefCell::new(VecDeque::new()) };
}

/// Buffers with less capacity than this are not worth keeping.
const MIN_POOL_CAPACITY: usize = 16;

/// Maximum number of buffers kept per thread.
const MAX_POOL_SIZE: usize = 32;

/// Take a zero-filled buffer of exactly `len` elements, reusing a pooled one if possible.
pub fn acquire(len: usize) -> Vec<f32> {
    POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        if let Some(pos) = pool.iter().position(|b| b.capacity() >= len) {
            if let Some(mut buf) = pool.remove(pos) {
                buf.clear();
                buf.resize(len, 0.0);
                return buf;
            }
        }
        vec![0.0; len]
    })
}

/// Hand a buffer back for reuse.
pub fn release(mut buf: Vec<f32>) {
    if buf.capacity() < MIN_POOL_CAPACITY {
        return;
    }
    POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() >= MAX_POOL_SIZE {
            return;
        }
        buf.clear();
        pool.push_back(buf);
    });
}

/// Pooled buffer guard; derefs to a slice.
pub struct ScratchBuffer {
    buf: Vec<f32>,
}

impl ScratchBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self { buf: acquire(len) }
    }

    /// Reset every element to zero.
    pub fn clear(&mut self) {
        self.buf.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Detach the allocation from the pool.
    pub fn into_vec(mut self) -> Vec<f32> {
        std::mem::take(&mut self.buf)
    }
}

impl Deref for ScratchBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_buffers_come_back_zeroed() {
        let mut a = ScratchBuffer::zeroed(64);
        a.iter_mut().for_each(|v| *v = 3.0);
        drop(a);
        let b = ScratchBuffer::zeroed(32);
        assert_eq!(b.len(), 32);
        assert!(b.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn into_vec_keeps_contents() {
        let mut a = ScratchBuffer::zeroed(4);
        a[2] = 1.5;
        assert_eq!(a.into_vec(), vec![0.0, 0.0, 1.5, 0.0]);
    }
}
