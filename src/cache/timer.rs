//! One-shot idle countdown
//!
//! Holds at most one pending callback. Every `schedule` replaces the
//! previous one, so a burst of accesses produces a single firing measured
//! from the last access.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::clock::{Clock, SystemClock};

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct Pending {
	deadline: Instant,
	on_fire: Callback,
}

#[derive(Default)]
struct State {
	pending: Option<Pending>,
	fired: u64,
	shutdown: bool,
}

struct Shared {
	state: Mutex<State>,
	wake: Condvar,
	clock: Arc<dyn Clock>,
	delay: Duration,
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Takes the pending callback if its deadline has passed.
	fn take_due(&self) -> Option<Callback> {
		let mut state = self.lock();
		let due = state
			.pending
			.as_ref()
			.is_some_and(|p| p.deadline <= self.clock.now());
		if !due {
			return None;
		}
		state.fired += 1;
		state.pending.take().map(|p| p.on_fire)
	}
}

pub struct IdleEvictionTimer {
	shared: Arc<Shared>,
}

impl IdleEvictionTimer {
	/// Timer driven by its own background thread on the wall clock.
	pub fn new(delay: Duration) -> Self {
		let timer = Self::build(delay, Arc::new(SystemClock));
		let shared = Arc::clone(&timer.shared);
		thread::spawn(move || run(shared));
		timer
	}

	/// Timer with no thread; callers advance it with [`fire_due`](Self::fire_due).
	pub fn manual(delay: Duration, clock: Arc<dyn Clock>) -> Self {
		Self::build(delay, clock)
	}

	fn build(delay: Duration, clock: Arc<dyn Clock>) -> Self {
		Self {
			shared: Arc::new(Shared {
				state: Mutex::new(State::default()),
				wake: Condvar::new(),
				clock,
				delay,
			}),
		}
	}

	pub fn delay(&self) -> Duration {
		self.shared.delay
	}

	/// Arms the countdown, dropping any callback still pending.
	pub fn schedule<F>(&self, on_fire: F)
	where
		F: FnOnce() + Send + 'static,
	{
		let deadline = self.shared.clock.now() + self.shared.delay;
		let replaced = {
			let mut state = self.shared.lock();
			state.pending.replace(Pending {
				deadline,
				on_fire: Box::new(on_fire),
			})
		};
		self.shared.wake.notify_all();
		// Dropped outside the lock; the callback may own arbitrary state.
		drop(replaced);
	}

	/// Returns whether a pending callback was discarded.
	pub fn cancel(&self) -> bool {
		let cancelled = self.shared.lock().pending.take();
		self.shared.wake.notify_all();
		cancelled.is_some()
	}

	pub fn is_pending(&self) -> bool {
		self.shared.lock().pending.is_some()
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.shared.lock().pending.as_ref().map(|p| p.deadline)
	}

	/// Time left before the pending callback fires.
	pub fn remaining(&self) -> Option<Duration> {
		let deadline = self.deadline()?;
		Some(deadline.saturating_duration_since(self.shared.clock.now()))
	}

	/// Number of callbacks that have fired so far.
	pub fn fired(&self) -> u64 {
		self.shared.lock().fired
	}

	/// Fires the pending callback on the calling thread if it is due.
	pub fn fire_due(&self) -> bool {
		match self.shared.take_due() {
			Some(on_fire) => {
				on_fire();
				true
			}
			None => false,
		}
	}
}

impl Drop for IdleEvictionTimer {
	fn drop(&mut self) {
		let pending = {
			let mut state = self.shared.lock();
			state.shutdown = true;
			state.pending.take()
		};
		self.shared.wake.notify_all();
		drop(pending);
	}
}

fn run(shared: Arc<Shared>) {
	loop {
		{
			let mut state = shared.lock();
			loop {
				if state.shutdown {
					return;
				}
				let wait = match &state.pending {
					None => None,
					Some(p) => {
						let now = shared.clock.now();
						if p.deadline <= now {
							break;
						}
						Some(p.deadline - now)
					}
				};
				state = match wait {
					None => shared.wake.wait(state).unwrap_or_else(|e| e.into_inner()),
					Some(timeout) => {
						shared
							.wake
							.wait_timeout(state, timeout)
							.unwrap_or_else(|e| e.into_inner())
							.0
					}
				};
			}
		}

		if let Some(on_fire) = shared.take_due() {
			on_fire();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::clock::ManualClock;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
		let count = Arc::new(AtomicUsize::new(0));
		let hit = Arc::clone(&count);
		(count, move || {
			hit.fetch_add(1, Ordering::SeqCst);
		})
	}

	#[test]
	fn second_schedule_replaces_first() {
		let clock = Arc::new(ManualClock::new());
		let timer = IdleEvictionTimer::manual(Duration::from_secs(120), clock.clone());

		let (first, on_first) = counter();
		let (second, on_second) = counter();

		timer.schedule(on_first);
		clock.advance(Duration::from_secs(60));
		timer.schedule(on_second);

		// The first deadline passes without anything firing.
		clock.advance(Duration::from_secs(60));
		assert!(!timer.fire_due());
		assert_eq!(timer.remaining(), Some(Duration::from_secs(60)));

		clock.advance(Duration::from_secs(60));
		assert!(timer.fire_due());
		assert!(!timer.fire_due());

		assert_eq!(first.load(Ordering::SeqCst), 0);
		assert_eq!(second.load(Ordering::SeqCst), 1);
		assert_eq!(timer.fired(), 1);
		assert!(!timer.is_pending());
	}

	#[test]
	fn cancel_is_safe_when_idle() {
		let clock = Arc::new(ManualClock::new());
		let timer = IdleEvictionTimer::manual(Duration::from_secs(1), clock.clone());
		assert!(!timer.cancel());

		let (count, on_fire) = counter();
		timer.schedule(on_fire);
		assert!(timer.cancel());
		assert!(!timer.cancel());

		clock.advance(Duration::from_secs(5));
		assert!(!timer.fire_due());
		assert_eq!(count.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn not_due_before_deadline() {
		let clock = Arc::new(ManualClock::new());
		let timer = IdleEvictionTimer::manual(Duration::from_millis(100), clock.clone());
		let (count, on_fire) = counter();

		timer.schedule(on_fire);
		clock.advance(Duration::from_millis(99));
		assert!(!timer.fire_due());
		clock.advance(Duration::from_millis(1));
		assert!(timer.fire_due());
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn background_thread_fires_once_after_reset() {
		let timer = IdleEvictionTimer::new(Duration::from_millis(200));
		let (first, on_first) = counter();
		let (second, on_second) = counter();

		timer.schedule(on_first);
		thread::sleep(Duration::from_millis(100));
		timer.schedule(on_second);

		// 250ms after start: the original deadline (200ms) has passed, the reset one (300ms) has not.
		thread::sleep(Duration::from_millis(150));
		assert_eq!(first.load(Ordering::SeqCst), 0);
		assert_eq!(second.load(Ordering::SeqCst), 0);

		thread::sleep(Duration::from_millis(400));
		assert_eq!(first.load(Ordering::SeqCst), 0);
		assert_eq!(second.load(Ordering::SeqCst), 1);
		assert_eq!(timer.fired(), 1);
	}

	#[test]
	fn dropping_timer_discards_pending_callback() {
		let (count, on_fire) = counter();
		{
			let timer = IdleEvictionTimer::new(Duration::from_millis(50));
			timer.schedule(on_fire);
		}
		thread::sleep(Duration::from_millis(150));
		assert_eq!(count.load(Ordering::SeqCst), 0);
	}
}
