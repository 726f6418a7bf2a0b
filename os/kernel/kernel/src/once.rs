//! # Write-Once Cells
//!
//! Early boot runs on a single core with interrupts disabled, but the results
//! end up in `static`s read by later stages. These cells make the single
//! writer explicit: writing twice is a bug and panics.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FULL: u8 = 2;
const TAKEN: u8 = 3;

/// A value published once and then shared read-only.
pub struct PublishOnce<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for PublishOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PublishOnce<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Store `value` and return a shared reference to it.
    ///
    /// # Panics
    /// If a value was already published.
    pub fn publish(&self, value: T) -> &T {
        assert!(
            self.state
                .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
                .is_ok(),
            "value published twice"
        );
        // SAFETY: The WRITING state excludes every other writer and reader.
        let value = unsafe { (*self.value.get()).write(value) };
        self.state.store(FULL, Ordering::Release);
        value
    }

    /// The published value, if any.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == FULL {
            // SAFETY: FULL guarantees the write is done and never repeated.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

// SAFETY: Shared access only after FULL; initialization is single-writer.
unsafe impl<T: Sync + Send> Sync for PublishOnce<T> {}
unsafe impl<T: Send> Send for PublishOnce<T> {}

/// A value handed from one owner to the next exactly once.
///
/// Unlike [`PublishOnce`], no shared reference is ever given out; the value
/// is moved in with [`put`](Self::put) and moved out with [`take`](Self::take).
pub struct Handoff<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Handoff<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Deposit `value`.
    ///
    /// # Panics
    /// If a value was already deposited, even if it has been taken since.
    pub fn put(&self, value: T) {
        assert!(
            self.state
                .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
                .is_ok(),
            "value handed off twice"
        );
        // SAFETY: The WRITING state excludes every other access.
        unsafe { (*self.value.get()).write(value) };
        self.state.store(FULL, Ordering::Release);
    }

    /// Remove the deposited value. Returns `None` if there is none or it has
    /// already been taken.
    pub fn take(&self) -> Option<T> {
        self.state
            .compare_exchange(FULL, TAKEN, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        // SAFETY: The FULL -> TAKEN transition happens exactly once.
        Some(unsafe { (*self.value.get()).assume_init_read() })
    }
}

impl<T> Drop for Handoff<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FULL {
            // SAFETY: FULL means the value was written and not taken.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

// SAFETY: The value is only ever moved, never shared.
unsafe impl<T: Send> Sync for Handoff<T> {}
unsafe impl<T: Send> Send for Handoff<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn publish_then_get() {
        let cell = PublishOnce::new();
        assert_eq!(cell.get(), None);
        assert_eq!(*cell.publish(7u32), 7);
        assert_eq!(cell.get(), Some(&7));
    }

    #[test]
    #[should_panic(expected = "value published twice")]
    fn second_publish_panics() {
        let cell = PublishOnce::new();
        cell.publish(1u8);
        cell.publish(2u8);
    }

    #[test]
    fn handoff_moves_the_value_out_once() {
        let cell = Handoff::new();
        assert_eq!(cell.take(), None::<String>);
        cell.put(String::from("frames"));
        assert_eq!(cell.take().as_deref(), Some("frames"));
        assert_eq!(cell.take(), None);
    }

    #[test]
    #[should_panic(expected = "value handed off twice")]
    fn second_put_panics_even_after_take() {
        let cell = Handoff::new();
        cell.put(1u8);
        let _ = cell.take();
        cell.put(2u8);
    }

    #[test]
    fn untaken_value_is_dropped_with_the_cell() {
        let shared = Rc::new(());
        {
            let cell = Handoff::new();
            cell.put(Rc::clone(&shared));
            assert_eq!(Rc::strong_count(&shared), 2);
        }
        assert_eq!(Rc::strong_count(&shared), 1);
    }
}
