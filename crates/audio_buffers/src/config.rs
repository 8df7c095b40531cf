/// The number of slots in every [crate::BufferPool].
///
/// This is hardcoded on purpose.  If an engine suddenly needs more buffers than this at once, we want to find out
/// (loudly) instead of quietly growing.
pub const POOL_CAPACITY: usize = 8;

/// The slot size a host gets if it doesn't pick one, in samples.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// How many sample borrows (`samples()`/`samples_mut()` guards) may be alive on one slot at once.
///
/// Each slot keeps a fixed table of them so that disjoint slices can be borrowed independently without allocating.
pub const MAX_BORROWS_PER_SLOT: usize = 8;
