//! Which thread runs the callbacks.
//!
//! The `rt_*` macros read this to decide between the preallocated log queue and calling `log` in place.
use std::cell::Cell;

thread_local! {
    static RUNS_CALLBACKS: Cell<bool> = const { Cell::new(false) };
}

/// True on a thread which has called [mark_audio_thread].
pub fn is_audio_thread() -> bool {
    RUNS_CALLBACKS.get()
}

/// Send every `rt_*` diagnostic from this thread through the log queue, for the rest of the thread's life.
///
/// Call it first thing on the thread that owns the [crate::BufferPool].  There is no unmarking.
pub fn mark_audio_thread() {
    RUNS_CALLBACKS.set(true);
}
