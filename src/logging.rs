//! Library log macros.
//!
//! With the `logging` feature the macros forward to `tracing`; without it
//! they expand to nothing and their arguments are never evaluated. The
//! library never installs a subscriber, the `solty` binary does.
//!
//! ```rust,ignore
//! use crate::logging::{debug, trace};
//!
//! trace!(routine = %name, "cache hit");
//! debug!(id = id.0, name = %def.name, "defined struct");
//! ```

/// Per-routine and per-slot detail: cache hits, packing decisions.
#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

/// Definitions entering the registry, routine calls and halts.
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Once per batch of generated routines.
#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

/// Execution limits being hit.
#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub(crate) use log_debug as debug;
pub(crate) use log_info as info;
pub(crate) use log_trace as trace;
pub(crate) use log_warn as warn;
