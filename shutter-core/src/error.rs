//! Error types for the tracing runtime.
//!
//! Saving is the only fallible surface; the producer hot path never fails.
//! None of these errors are recoverable at the core boundary: the caller
//! decides whether to drop the trace, retry the save against a fresh sink,
//! or keep producing (which stays safe after a failed save).

use thiserror::Error;

/// Convenience result type for runtime operations.
pub type Result<T> = std::result::Result<T, TraceError>;

/// The main error type for trace capture and save operations.
#[derive(Error, Debug)]
pub enum TraceError {
    // =========================================================================
    // Save Errors (E001-E099)
    // =========================================================================
    /// The payload walk produced fewer bytes than the part header declared.
    ///
    /// The chunk written so far must be considered corrupt. This indicates a
    /// logic bug or an event buffer written by more than one thread.
    #[error(
        "E001: Size mismatch in part '{part}': header declared {declared} bytes, \
         payload walk produced {produced}"
    )]
    SizeMismatch {
        /// Name of the part whose payload came up short.
        part: String,
        /// Bytes declared by the part header.
        declared: u32,
        /// Bytes the payload walk could produce.
        produced: u32,
    },

    /// The byte sink reported a write failure.
    ///
    /// The save aborts and the sink is considered compromised.
    #[error("E002: Sink write failed: {0}")]
    SinkWrite(#[from] std::io::Error),

    // =========================================================================
    // Registration Errors (E100-E199)
    // =========================================================================
    /// A thread attempted to register under a different name than before.
    ///
    /// The registry is unchanged; the original registration stays valid.
    #[error(
        "E101: Thread already registered as '{existing}', re-registration as \
         '{requested}' rejected"
    )]
    ReregisterConflict {
        /// The name recorded at first registration.
        existing: String,
        /// The conflicting name from the rejected call.
        requested: String,
    },
}
