//! # Model Cache
//!
//! Lazy single-resident model slots with idle eviction. Each subsystem
//! owns one [`Orchestrator`] wrapping one [`ModelSlot`]; nothing is shared
//! between subsystems.

pub mod clock;
pub mod error;
pub mod orchestrator;
pub mod slot;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Failure, InferenceError, LoadError, Outcome};
pub use orchestrator::{Orchestrator, SlotStatus};
pub use slot::{Lease, ModelLoader, ModelSlot, SlotStats};
pub use timer::IdleEvictionTimer;
