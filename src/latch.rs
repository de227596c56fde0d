//! First-failure-wins latch
//!
//! A `FatalLatch` records at most one error. Every component holding the
//! latch observes the same value afterwards, and tasks parked in
//! [`FatalLatch::tripped`] are woken the moment it is set.

use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

pub struct FatalLatch<E> {
	slot: Mutex<Option<E>>,
	notify: Notify,
}

impl<E: Clone> FatalLatch<E> {
	pub fn new() -> Self {
		Self { slot: Mutex::new(None), notify: Notify::new() }
	}

	/// Record `err` unless an error is already latched.
	///
	/// Returns `true` when an earlier error was already present, in which
	/// case `err` is discarded.
	pub fn check_and_set(&self, err: E) -> bool {
		let already_set = {
			let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
			if slot.is_some() {
				true
			} else {
				*slot = Some(err);
				false
			}
		};
		if !already_set {
			self.notify.notify_waiters();
		}
		already_set
	}

	/// The latched error, if any
	pub fn get(&self) -> Option<E> {
		self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}

	pub fn is_set(&self) -> bool {
		self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
	}

	/// Resolve once an error has been latched
	pub async fn tripped(&self) {
		loop {
			// Register before checking so a concurrent set cannot slip between.
			let notified = self.notify.notified();
			if self.is_set() {
				return;
			}
			notified.await;
		}
	}
}

impl<E: Clone> Default for FatalLatch<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: Clone + std::fmt::Debug> std::fmt::Debug for FatalLatch<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FatalLatch").field("error", &self.get()).finish()
	}
}


// vim: ts=4
