//! Single-resident model slot
//!
//! A slot owns at most one loaded model. Requests borrow it through a
//! [`Lease`]; while any lease is alive the model cannot be evicted, and a
//! request for a different model waits for the leases to drain before the
//! swap starts.

use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use super::error::LoadError;
use crate::ui;

/// Loads and releases the models held by a [`ModelSlot`].
pub trait ModelLoader: Send + Sync + 'static {
	type Handle: Send + Sync + 'static;

	fn load(&self, name: &str) -> Result<Self::Handle, LoadError>;

	/// Frees whatever the handle holds (processes, GPU memory).
	fn release(&self, name: &str, handle: Self::Handle) -> anyhow::Result<()> {
		let _ = name;
		drop(handle);
		Ok(())
	}
}

struct Resident<H> {
	name: String,
	handle: Arc<H>,
}

struct SlotState<H> {
	resident: Option<Resident<H>>,
	leases: usize,
	loading: Option<String>,
	/// An evicted handle is still being torn down.
	releasing: bool,
	stats: SlotStats,
}

enum Step<H> {
	Hit(Arc<H>),
	Wait(String),
	Load,
}

/// Lifetime counters for one slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SlotStats {
	pub loads: u64,
	pub hits: u64,
	pub load_failures: u64,
	pub evictions: u64,
	pub refused_evictions: u64,
}

pub struct ModelSlot<L: ModelLoader> {
	label: &'static str,
	loader: L,
	state: Mutex<SlotState<L::Handle>>,
	changed: Condvar,
}

impl<L: ModelLoader> ModelSlot<L> {
	pub fn new(label: &'static str, loader: L) -> Self {
		Self {
			label,
			loader,
			state: Mutex::new(SlotState {
				resident: None,
				leases: 0,
				loading: None,
				releasing: false,
				stats: SlotStats::default(),
			}),
			changed: Condvar::new(),
		}
	}

	fn lock(&self) -> MutexGuard<'_, SlotState<L::Handle>> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn wait<'a>(
		&self,
		guard: MutexGuard<'a, SlotState<L::Handle>>,
	) -> MutexGuard<'a, SlotState<L::Handle>> {
		self.changed.wait(guard).unwrap_or_else(|e| e.into_inner())
	}

	pub fn label(&self) -> &'static str {
		self.label
	}

	pub fn loader(&self) -> &L {
		&self.loader
	}

	/// Returns the handle for `name`, swapping out any other resident model.
	pub fn ensure_loaded(&self, name: &str) -> Result<Lease<'_, L>, LoadError> {
		let mut state = self.lock();

		loop {
			if state.loading.is_some() || state.releasing {
				state = self.wait(state);
				continue;
			}
			let step = match &state.resident {
				Some(resident) if resident.name == name => Step::Hit(Arc::clone(&resident.handle)),
				Some(resident) if state.leases > 0 => Step::Wait(resident.name.clone()),
				_ => Step::Load,
			};
			match step {
				Step::Hit(handle) => {
					state.leases += 1;
					state.stats.hits += 1;
					return Ok(Lease {
						slot: self,
						name: name.to_string(),
						handle,
					});
				}
				Step::Wait(busy) => {
					ui::debug(&format!(
						"{}: waiting for '{}' to finish before loading '{}'",
						self.label, busy, name
					));
					state = self.wait(state);
				}
				Step::Load => break,
			}
		}

		state.loading = Some(name.to_string());
		let previous = state.resident.take();
		if previous.is_some() {
			state.stats.evictions += 1;
		}
		drop(state);

		if let Some(previous) = previous {
			ui::info(&format!("{}: unloading '{}'", self.label, previous.name));
			self.release(previous);
		}

		ui::info(&format!("{}: loading '{}'", self.label, name));
		let loaded = self.loader.load(name);

		let mut state = self.lock();
		state.loading = None;
		let result = match loaded {
			Ok(handle) => {
				let handle = Arc::new(handle);
				state.resident = Some(Resident {
					name: name.to_string(),
					handle: Arc::clone(&handle),
				});
				state.leases += 1;
				state.stats.loads += 1;
				ui::success(&format!("{}: '{}' ready", self.label, name));
				Ok(Lease {
					slot: self,
					name: name.to_string(),
					handle,
				})
			}
			Err(e) => {
				state.stats.load_failures += 1;
				Err(e)
			}
		};
		drop(state);
		self.changed.notify_all();
		result
	}

	/// Releases the resident model. `false` if empty or in use.
	pub fn evict(&self) -> bool {
		self.evict_matching(None)
	}

	/// Evicts only if `name` is still the resident model.
	///
	/// Timer callbacks go through here so a countdown armed for a model that
	/// has since been replaced cannot evict its successor.
	pub fn unload_if(&self, name: &str) -> bool {
		self.evict_matching(Some(name))
	}

	fn evict_matching(&self, expected: Option<&str>) -> bool {
		let mut state = self.lock();

		let resident_name = match &state.resident {
			Some(resident) => resident.name.clone(),
			None => return false,
		};
		if expected.is_some_and(|name| name != resident_name) {
			ui::debug(&format!(
				"{}: stale eviction for '{}' ignored, '{}' is resident",
				self.label,
				expected.unwrap_or_default(),
				resident_name
			));
			return false;
		}
		if state.leases > 0 {
			state.stats.refused_evictions += 1;
			ui::warn(&format!(
				"{}: eviction of '{}' refused, {} request(s) still running",
				self.label, resident_name, state.leases
			));
			return false;
		}

		let resident = state.resident.take();
		state.stats.evictions += 1;
		state.releasing = true;
		drop(state);

		if let Some(resident) = resident {
			ui::info(&format!("{}: unloading '{}'", self.label, resident.name));
			self.release(resident);
		}
		self.lock().releasing = false;
		self.changed.notify_all();
		true
	}

	fn release(&self, resident: Resident<L::Handle>) {
		let Resident { name, mut handle } = resident;
		let handle = loop {
			match Arc::try_unwrap(handle) {
				Ok(handle) => break handle,
				// A lease gives its count back just before dropping its reference.
				Err(shared) => {
					handle = shared;
					std::thread::yield_now();
				}
			}
		};
		if let Err(e) = self.loader.release(&name, handle) {
			ui::warn(&format!("{}: releasing '{}' failed: {:#}", self.label, name, e));
		}
	}

	pub fn resident_name(&self) -> Option<String> {
		self.lock().resident.as_ref().map(|r| r.name.clone())
	}

	pub fn is_resident(&self, name: &str) -> bool {
		self.lock().resident.as_ref().is_some_and(|r| r.name == name)
	}

	/// Number of requests currently holding the model.
	pub fn active_leases(&self) -> usize {
		self.lock().leases
	}

	pub fn stats(&self) -> SlotStats {
		self.lock().stats
	}
}

impl<L: ModelLoader> Drop for ModelSlot<L> {
	fn drop(&mut self) {
		let resident = self.lock().resident.take();
		if let Some(resident) = resident {
			self.release(resident);
		}
	}
}

/// Borrowed access to the resident model for the duration of one request.
pub struct Lease<'a, L: ModelLoader> {
	slot: &'a ModelSlot<L>,
	name: String,
	handle: Arc<L::Handle>,
}

impl<L: ModelLoader> Lease<'_, L> {
	pub fn name(&self) -> &str {
		&self.name
	}
}

impl<L: ModelLoader> Deref for Lease<'_, L> {
	type Target = L::Handle;

	fn deref(&self) -> &Self::Target {
		&self.handle
	}
}

impl<L: ModelLoader> Drop for Lease<'_, L> {
	fn drop(&mut self) {
		{
			let mut state = self.slot.lock();
			state.leases = state.leases.saturating_sub(1);
		}
		self.slot.changed.notify_all();
	}
}
