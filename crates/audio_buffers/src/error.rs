/// Every slot of a pool is held by at least one live handle.
///
/// This is unrecoverable in the middle of a callback.  See [crate::ExhaustionHandler].
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("No free audio buffers: all {capacity} slots of {buffer_size} samples are in use")]
pub struct PoolExhausted {
    pub capacity: usize,
    pub buffer_size: usize,
}

/// A range did not fit inside the view it was applied to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("Range {start}..{end} is out of bounds for a view of length {len}")]
pub struct InvalidRange {
    pub start: usize,
    pub end: usize,
    pub len: usize,
}

/// Errors from the non-realtime half of [crate::BufferPool].
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum PoolError {
    #[error("Cannot resize the pool while {live} buffer handles are alive")]
    HandlesOutstanding { live: usize },
}
