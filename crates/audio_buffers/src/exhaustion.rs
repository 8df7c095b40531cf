use crate::PoolExhausted;

/// What [crate::BufferPool::allocate] does when every slot is taken.
///
/// The handler must not return: the callback cannot continue without the buffer it asked for, and handing back memory
/// someone else is using would corrupt the stream.  By the time a handler runs, the pool has already logged the
/// condition at error level.
pub type ExhaustionHandler = fn(&PoolExhausted) -> !;

/// Abort the process.  This is the default.
pub fn abort_on_exhaustion(_condition: &PoolExhausted) -> ! {
    std::process::abort()
}

/// Panic with the [PoolExhausted] itself as the payload.
///
/// For hosts which catch the unwind (`std::panic::catch_unwind`) around their callback and shut down in a controlled
/// way.  Only sensible with `panic = "unwind"`.
pub fn panic_on_exhaustion(condition: &PoolExhausted) -> ! {
    std::panic::panic_any(*condition)
}
