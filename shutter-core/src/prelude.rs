//! Prelude for convenient imports.
//!
//! ```
//! use shutter_core::prelude::*;
//! ```

pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::error::{Result, TraceError};
pub use crate::event::{ArgValue, ControlWord, EventKind, ScopeGuard, ScopeSite};
pub use crate::runtime::{Runtime, RuntimeConfig, ThreadHandle};
pub use crate::types::{ScopeId, StringId};
pub use crate::{trace_event, trace_scope};
