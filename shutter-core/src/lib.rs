//! Shutter Core Library
//!
//! A low-overhead, in-process tracing runtime. Producer threads record
//! timestamped events and nested scopes into per-thread append-only
//! buffers; a saver thread snapshots everything into a chunked binary
//! trace stream for offline analysis.
//!
//! # Key Components
//!
//! - **Runtime**: process-wide registry of per-thread event buffers plus
//!   the shared string table; orchestrates snapshot saves
//! - **EventBuffer**: lock-free single-writer slot chain; the producer
//!   hot path is plain arithmetic plus one release store
//! - **StringTable**: interns names and scope descriptors to dense ids
//! - **OutputBuffer**: chunk framing with aligned parts, little-endian
//!
//! # Example
//!
//! ```
//! use shutter_core::{trace_scope, Runtime};
//!
//! let runtime = Runtime::new();
//! let handle = runtime.register_thread("worker").unwrap();
//!
//! for batch in 0..4u32 {
//!     let _scope = trace_scope!(handle, "worker#batch: index", batch);
//! }
//!
//! let mut trace = Vec::new();
//! runtime.save(&mut trace).unwrap();
//! assert!(!trace.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod clock;
pub mod error;
pub mod event;
mod macros;
pub mod output;
pub mod prelude;
pub mod runtime;
pub mod strings;
pub mod types;

// Re-export key types at crate root for convenience
pub use buffer::{EventBuffer, SlotReservation};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{Result, TraceError};
pub use event::{ArgValue, ControlWord, EventKind, ScopeGuard, ScopeSite};
pub use runtime::{Runtime, RuntimeConfig, ThreadHandle};
pub use strings::StringTable;
pub use types::{ScopeId, StringId};
