//! Per-subsystem request orchestration
//!
//! Ensures the requested model is resident, runs the pipeline against it,
//! then re-arms the idle countdown. Failures come back as [`Outcome`]
//! values; nothing here aborts the host process.

use std::sync::{Arc, Weak};
use std::time::Duration;

use super::error::{Failure, InferenceError, LoadError, Outcome};
use super::slot::{ModelLoader, ModelSlot, SlotStats};
use super::timer::IdleEvictionTimer;
use crate::ui;

pub struct Orchestrator<L: ModelLoader> {
	slot: Arc<ModelSlot<L>>,
	timer: IdleEvictionTimer,
}

/// Snapshot of a subsystem for status displays.
#[derive(Debug, Clone)]
pub struct SlotStatus {
	pub label: &'static str,
	pub resident: Option<String>,
	pub active: usize,
	pub idle_remaining: Option<Duration>,
	pub stats: SlotStats,
}

impl<L: ModelLoader> Orchestrator<L> {
	pub fn new(label: &'static str, loader: L, idle: Duration) -> Self {
		Self::with_timer(label, loader, IdleEvictionTimer::new(idle))
	}

	pub fn with_timer(label: &'static str, loader: L, timer: IdleEvictionTimer) -> Self {
		Self {
			slot: Arc::new(ModelSlot::new(label, loader)),
			timer,
		}
	}

	/// Runs `invoke` against the model called `name`, loading it if needed.
	pub fn handle_request<R, F>(&self, name: &str, invoke: F) -> Outcome<R>
	where
		F: FnOnce(&L::Handle) -> Result<R, InferenceError>,
	{
		let lease = match self.slot.ensure_loaded(name) {
			Ok(lease) => lease,
			Err(e) => {
				ui::error(&format!("{}: {}", self.slot.label(), e));
				return Outcome::Failed(Failure::Load(e));
			}
		};

		let result = invoke(&lease);
		drop(lease);
		self.arm_eviction(name);

		match result {
			Ok(output) => Outcome::Completed(output),
			Err(e) => {
				ui::error(&format!("{}: {}", self.slot.label(), e));
				Outcome::Failed(Failure::Inference(e))
			}
		}
	}

	/// Makes `name` resident ahead of the first request.
	pub fn preload(&self, name: &str) -> Result<(), LoadError> {
		drop(self.slot.ensure_loaded(name)?);
		self.arm_eviction(name);
		Ok(())
	}

	/// Explicit unload. `false` if nothing was resident or a request is running.
	pub fn unload(&self) -> bool {
		self.timer.cancel();
		self.slot.evict()
	}

	fn arm_eviction(&self, name: &str) {
		let slot: Weak<ModelSlot<L>> = Arc::downgrade(&self.slot);
		let name = name.to_string();
		let label = self.slot.label();
		let idle = self.timer.delay();

		self.timer.schedule(move || {
			let Some(slot) = slot.upgrade() else {
				return;
			};
			if slot.unload_if(&name) {
				ui::event(&format!(
					"{}: '{}' idle for {}s, unloaded",
					label,
					name,
					idle.as_secs()
				));
			}
		});
	}

	pub fn slot(&self) -> &ModelSlot<L> {
		&self.slot
	}

	pub fn timer(&self) -> &IdleEvictionTimer {
		&self.timer
	}

	pub fn status(&self) -> SlotStatus {
		SlotStatus {
			label: self.slot.label(),
			resident: self.slot.resident_name(),
			active: self.slot.active_leases(),
			idle_remaining: self.timer.remaining(),
			stats: self.slot.stats(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::clock::ManualClock;
	use crate::cache::slot::tests::{Event, RecordingLoader};

	fn manual(delay_ms: u64) -> (Arc<ManualClock>, IdleEvictionTimer) {
		let clock = Arc::new(ManualClock::new());
		let timer = IdleEvictionTimer::manual(Duration::from_millis(delay_ms), clock.clone());
		(clock, timer)
	}

	fn echo(handle: &crate::cache::slot::tests::FakeHandle) -> Result<String, InferenceError> {
		Ok(handle.name.clone())
	}

	#[test]
	fn passes_result_through_and_arms_timer() {
		let (_clock, timer) = manual(100);
		let orchestrator = Orchestrator::with_timer("chat", RecordingLoader::default(), timer);

		let outcome = orchestrator.handle_request("A", echo);
		assert_eq!(outcome.completed().as_deref(), Some("A"));
		assert!(orchestrator.timer().is_pending());
		assert!(orchestrator.slot().is_resident("A"));
	}

	#[test]
	fn access_resets_idle_countdown() {
		let (clock, timer) = manual(100);
		let orchestrator = Orchestrator::with_timer("image", RecordingLoader::default(), timer);

		assert!(orchestrator.handle_request("A", echo).is_completed());
		clock.advance(Duration::from_millis(50));
		assert!(orchestrator.handle_request("A", echo).is_completed());

		// The first deadline (100ms) no longer applies.
		clock.advance(Duration::from_millis(50));
		assert!(!orchestrator.timer().fire_due());
		assert!(orchestrator.slot().is_resident("A"));

		clock.advance(Duration::from_millis(50));
		assert!(orchestrator.timer().fire_due());
		assert_eq!(orchestrator.slot().resident_name(), None);
		assert_eq!(orchestrator.slot().stats().hits, 1);
	}

	#[test]
	fn stale_countdown_does_not_evict_successor() {
		let (clock, timer) = manual(100);
		let loader = RecordingLoader::default();
		let orchestrator = Orchestrator::with_timer("chat", loader.clone(), timer);

		assert!(orchestrator.handle_request("A", echo).is_completed());
		// Swap outside the orchestrator so A's countdown stays armed.
		drop(orchestrator.slot().ensure_loaded("B").unwrap());

		clock.advance(Duration::from_millis(100));
		assert!(orchestrator.timer().fire_due());
		assert!(orchestrator.slot().is_resident("B"));
		assert_eq!(
			loader.events(),
			vec![
				Event::Load("A".into()),
				Event::Release("A".into()),
				Event::Load("B".into())
			]
		);
	}

	#[test]
	fn long_generation_is_not_evicted_mid_flight() {
		let (clock, timer) = manual(100);
		let orchestrator = Orchestrator::with_timer("speech", RecordingLoader::default(), timer);
		assert!(orchestrator.handle_request("A", echo).is_completed());

		let outcome = orchestrator.handle_request("A", |handle| {
			// The countdown from the previous request expires mid-generation.
			clock.advance(Duration::from_millis(250));
			assert!(orchestrator.timer().fire_due());
			Ok(handle.name.len())
		});

		assert_eq!(outcome.completed(), Some(1));
		assert!(orchestrator.slot().is_resident("A"));
		assert_eq!(orchestrator.slot().stats().refused_evictions, 1);

		// The model is still reclaimed once the request is over.
		assert!(orchestrator.timer().is_pending());
		clock.advance(Duration::from_millis(100));
		assert!(orchestrator.timer().fire_due());
		assert_eq!(orchestrator.slot().resident_name(), None);
	}

	#[test]
	fn inference_error_keeps_model_resident() {
		let (_clock, timer) = manual(100);
		let orchestrator = Orchestrator::with_timer("image", RecordingLoader::default(), timer);

		let outcome: Outcome<()> = orchestrator.handle_request("A", |_| {
			Err(InferenceError::Pipeline("CUDA out of memory".into()))
		});

		match outcome.failure() {
			Some(Failure::Inference(e)) => assert!(e.to_string().contains("out of memory")),
			other => panic!("unexpected outcome: {:?}", other),
		}
		assert!(orchestrator.slot().is_resident("A"));
		assert!(orchestrator.timer().is_pending());
	}

	#[test]
	fn load_error_is_reported_not_raised() {
		let (_clock, timer) = manual(100);
		let orchestrator = Orchestrator::with_timer("chat", RecordingLoader::default(), timer);

		let outcome = orchestrator.handle_request("broken", echo);
		assert!(matches!(outcome.failure(), Some(Failure::Load(_))));
		assert_eq!(orchestrator.slot().resident_name(), None);
		assert!(!orchestrator.timer().is_pending());
		assert!(outcome.into_result().is_err());
	}

	#[test]
	fn unload_cancels_countdown() {
		let (_clock, timer) = manual(100);
		let orchestrator = Orchestrator::with_timer("chat", RecordingLoader::default(), timer);

		assert!(!orchestrator.unload());
		orchestrator.preload("A").unwrap();
		assert!(orchestrator.timer().is_pending());

		assert!(orchestrator.unload());
		assert!(!orchestrator.timer().is_pending());
		assert_eq!(orchestrator.status().resident, None);
	}

	#[test]
	fn background_timer_evicts_after_idle() {
		let orchestrator =
			Orchestrator::new("chat", RecordingLoader::default(), Duration::from_millis(200));
		assert!(orchestrator.handle_request("A", echo).is_completed());
		std::thread::sleep(Duration::from_millis(100));
		assert!(orchestrator.handle_request("A", echo).is_completed());

		// Past the first deadline, before the reset one.
		std::thread::sleep(Duration::from_millis(150));
		assert!(orchestrator.slot().is_resident("A"));

		std::thread::sleep(Duration::from_millis(350));
		assert_eq!(orchestrator.slot().resident_name(), None);
	}
}
