//! Time sources for the idle timer

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + 'static {
	fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// Clock that only moves when told to. Used to drive timers deterministically.
#[derive(Debug)]
pub struct ManualClock {
	origin: Instant,
	offset: Mutex<Duration>,
}

impl ManualClock {
	pub fn new() -> Self {
		Self {
			origin: Instant::now(),
			offset: Mutex::new(Duration::ZERO),
		}
	}

	pub fn advance(&self, by: Duration) {
		let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
		*offset += by;
	}

	pub fn elapsed(&self) -> Duration {
		*self.offset.lock().unwrap_or_else(|e| e.into_inner())
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.origin + self.elapsed()
	}
}
