//! Fixed-capacity sample storage for audio callbacks.
//!
//! An audio callback must never allocate, block, or take a lock.  This crate provides a [BufferPool] which owns a small
//! fixed bank of preallocated sample slots, and a [BufferHandle] which is a reference-counted view into one of those
//! slots.  Handles are cheap to clone (a counter bump), can be sliced into sub-ranges without copying, and return their
//! slot to the pool when the last handle on it goes away.
//!
//! The pool and its handles are deliberately neither `Send` nor `Sync`: everything here is scratch memory for one
//! thread running one callback.  If another thread needs the data, copy it out through something which is actually
//! synchronized.
//!
//! Running out of slots is a configuration error (too many channels alive at once for the fixed capacity), and there
//! is no way to recover in the middle of a callback.  [BufferPool::allocate] therefore routes exhaustion to an
//! [ExhaustionHandler] which never returns.  The default aborts; hosts which want a controlled shutdown install their
//! own, or use [BufferPool::try_allocate].
//!
//! Diagnostics go through the `rt_error!`/`rt_warn!`/`rt_info!`/`rt_debug!` macros, which hosts may use from their own
//! callbacks too: see [mark_audio_thread] and [init_rt_logging].

#[macro_use]
mod logging;

pub mod config;
mod error;
mod exhaustion;
mod handle;
mod is_audio_thread;
mod pool;
mod range;

pub use error::*;
pub use exhaustion::{abort_on_exhaustion, panic_on_exhaustion, ExhaustionHandler};
pub use handle::{BufferHandle, Samples, SamplesMut};
pub use is_audio_thread::mark_audio_thread;
pub use logging::{flush_rt_log, init_rt_logging};
pub use pool::BufferPool;
pub use range::resolve_range;

/// Used by the exported `rt_*` macros.  Not public API.
#[doc(hidden)]
pub mod __private {
    pub use crate::is_audio_thread::is_audio_thread;
    pub use crate::logging::enqueue;
    pub use log;
}
