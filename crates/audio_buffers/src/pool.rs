use std::cell::{Cell, UnsafeCell};
use std::num::NonZeroUsize;
use std::rc::Rc;

use crate::config::{MAX_BORROWS_PER_SLOT, POOL_CAPACITY};
use crate::exhaustion::{abort_on_exhaustion, ExhaustionHandler};
use crate::handle::{BufferHandle, SlotLink};
use crate::{PoolError, PoolExhausted};

/// A range of one slot's samples which some guard is currently looking at.
#[derive(Copy, Clone, Debug)]
struct BorrowedRange {
    start: usize,
    end: usize,
    exclusive: bool,
}

impl BorrowedRange {
    fn conflicts_with(&self, other: &BorrowedRange) -> bool {
        (self.exclusive || other.exclusive) && self.start < other.end && other.start < self.end
    }
}

/// Bookkeeping for one slot: how many handles point at it, and which of its ranges are currently borrowed.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    refcount: Cell<u32>,

    /// Live sample borrows.  Shared borrows may overlap each other; an exclusive one may overlap nothing.
    borrows: [Cell<Option<BorrowedRange>>; MAX_BORROWS_PER_SLOT],
}

impl SlotState {
    pub(crate) fn refcount(&self) -> u32 {
        self.refcount.get()
    }

    fn is_free(&self) -> bool {
        self.refcount.get() < 1
    }

    pub(crate) fn incref(&self) {
        self.refcount.set(self.refcount.get() + 1);
    }

    pub(crate) fn decref(&self) {
        let old = self.refcount.get();
        debug_assert!(old > 0, "Slot reference count underflow");
        self.refcount.set(old - 1);
    }

    /// Record a borrow of samples `start..end` of this slot, returning the entry to hand back to
    /// [SlotState::release_borrow].
    ///
    /// Panics if the range overlaps a live borrow and either of the two is exclusive, or if every entry is taken.
    #[track_caller]
    pub(crate) fn acquire_borrow(&self, start: usize, end: usize, exclusive: bool) -> usize {
        let wanted = BorrowedRange { start, end, exclusive };
        let mut vacant = None;

        for (i, entry) in self.borrows.iter().enumerate() {
            match entry.get() {
                Some(held) if held.conflicts_with(&wanted) => panic!(
                    "Audio buffer samples {}..{} are already borrowed{}",
                    held.start,
                    held.end,
                    if held.exclusive { " mutably" } else { "" }
                ),
                Some(_) => {}
                None => {
                    vacant.get_or_insert(i);
                }
            }
        }

        let Some(index) = vacant else {
            panic!(
                "More than {} simultaneous borrows of one audio buffer slot",
                MAX_BORROWS_PER_SLOT
            );
        };
        self.borrows[index].set(Some(wanted));
        index
    }

    pub(crate) fn release_borrow(&self, entry: usize) {
        debug_assert!(self.borrows[entry].get().is_some());
        self.borrows[entry].set(None);
    }
}

/// The backing store shared by a pool and all of its handles.
///
/// One contiguous allocation of `POOL_CAPACITY * buffer_size` samples, and the per-slot state index-aligned with it.
pub(crate) struct PoolStorage {
    buffer_size: usize,
    samples: Box<[UnsafeCell<f32>]>,
    slots: [SlotState; POOL_CAPACITY],
}

impl PoolStorage {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            samples: (0..POOL_CAPACITY * buffer_size)
                .map(|_| UnsafeCell::new(0.0))
                .collect(),
            slots: Default::default(),
        }
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub(crate) fn slot(&self, index: usize) -> &SlotState {
        &self.slots[index]
    }

    /// Pointer to sample `offset` of slot `index`.
    ///
    /// `offset` may equal `buffer_size`, which gives the one-past-the-end pointer of that slot.
    pub(crate) fn sample_ptr(&self, index: usize, offset: usize) -> *mut f32 {
        assert!(index < POOL_CAPACITY && offset <= self.buffer_size);
        let pos = index * self.buffer_size + offset;
        // In bounds (or one past the end) per the assert above.  UnsafeCell<f32> has the same layout as f32, and going
        // through it is what makes writing via the pointer allowed.
        unsafe { UnsafeCell::raw_get(self.samples.as_ptr().add(pos)) }
    }
}

/// A fixed bank of [POOL_CAPACITY] sample slots, handed out as reference-counted [BufferHandle]s.
///
/// Allocation is a linear scan over the slots for the first one no handle points at.  After construction nothing
/// here allocates, locks, or blocks, except [BufferPool::set_buffer_size], which is for when audio is stopped.
///
/// The pool is `!Send` and `!Sync`, as are its handles: it belongs to exactly one audio thread.
///
/// ```compile_fail
/// use std::num::NonZeroUsize;
///
/// let pool = audio_buffers::BufferPool::new(NonZeroUsize::new(64).unwrap());
/// std::thread::spawn(move || pool.allocate());
/// ```
///
/// ```compile_fail
/// use std::num::NonZeroUsize;
///
/// let pool = audio_buffers::BufferPool::new(NonZeroUsize::new(64).unwrap());
/// std::thread::scope(|s| {
///     s.spawn(|| pool.buffer_size());
/// });
/// ```
pub struct BufferPool {
    storage: Rc<PoolStorage>,

    /// Highest slot index ever handed out, for capacity tuning.
    high_water: Cell<Option<usize>>,

    on_exhausted: ExhaustionHandler,
}

impl BufferPool {
    /// Preallocate [POOL_CAPACITY] zeroed slots of `buffer_size` samples each.
    pub fn new(buffer_size: NonZeroUsize) -> Self {
        Self {
            storage: Rc::new(PoolStorage::new(buffer_size.get())),
            high_water: Cell::new(None),
            on_exhausted: abort_on_exhaustion,
        }
    }

    /// Replace what happens when [BufferPool::allocate] finds no free slot.
    pub fn set_exhaustion_handler(&mut self, handler: ExhaustionHandler) {
        self.on_exhausted = handler;
    }

    /// Get a handle to a free slot, covering the whole slot.
    ///
    /// The contents are whatever the last user left there; see [BufferPool::allocate_cleared].
    ///
    /// If every slot is in use this logs the condition and calls the exhaustion handler, which does not return.
    pub fn allocate(&self) -> BufferHandle {
        match self.try_allocate() {
            Ok(h) => h,
            Err(condition) => {
                rt_error!("{}", condition);
                // We're going down.  Get the line out now rather than leave it in the queue.
                crate::logging::flush_rt_log();
                (self.on_exhausted)(&condition)
            }
        }
    }

    /// Like [BufferPool::allocate], but hand exhaustion back to the caller.
    pub fn try_allocate(&self) -> Result<BufferHandle, PoolExhausted> {
        let Some(index) = (0..POOL_CAPACITY).find(|&i| self.storage.slot(i).is_free()) else {
            return Err(PoolExhausted {
                capacity: POOL_CAPACITY,
                buffer_size: self.storage.buffer_size(),
            });
        };

        self.note_usage(index);
        let link = SlotLink::acquire(self.storage.clone(), index);
        Ok(BufferHandle::whole_slot(link, self.storage.buffer_size()))
    }

    /// Allocate, then zero the samples.
    pub fn allocate_cleared(&self) -> BufferHandle {
        let mut ret = self.allocate();
        ret.clear();
        ret
    }

    /// Allocate `K` independent buffers, typically one per channel.
    pub fn allocate_multi<const K: usize>(&self) -> [BufferHandle; K] {
        std::array::from_fn(|_| self.allocate())
    }

    /// Allocate `K` independent zeroed buffers.
    pub fn allocate_multi_cleared<const K: usize>(&self) -> [BufferHandle; K] {
        std::array::from_fn(|_| self.allocate_cleared())
    }

    /// Reallocate the backing store with a new slot size.
    ///
    /// Not realtime-safe: only call this while no callback is running.  All counts and the high-water mark are reset.
    /// Fails without touching anything if any handle from this pool (sliced or not) is still alive.
    pub fn set_buffer_size(&mut self, buffer_size: NonZeroUsize) -> Result<(), PoolError> {
        let live = Rc::strong_count(&self.storage) - 1;
        let Some(storage) = Rc::get_mut(&mut self.storage) else {
            return Err(PoolError::HandlesOutstanding { live });
        };

        log::debug!(
            "Resizing audio buffer pool from {} to {} samples per slot",
            storage.buffer_size(),
            buffer_size
        );
        *storage = PoolStorage::new(buffer_size.get());
        self.high_water.set(None);
        Ok(())
    }

    pub fn buffer_size(&self) -> usize {
        self.storage.buffer_size()
    }

    pub fn capacity(&self) -> usize {
        POOL_CAPACITY
    }

    /// How many slots at least one handle points at.
    pub fn slots_in_use(&self) -> usize {
        (0..POOL_CAPACITY)
            .filter(|&i| !self.storage.slot(i).is_free())
            .count()
    }

    /// The number of slots which have ever been needed at once, or rather the highest slot index used plus one.
    pub fn high_water_mark(&self) -> usize {
        self.high_water.get().map_or(0, |i| i + 1)
    }

    /// The reference count of a slot, or `None` if the index is past the capacity.
    pub fn reference_count(&self, slot: usize) -> Option<u32> {
        (slot < POOL_CAPACITY).then(|| self.storage.slot(slot).refcount())
    }

    fn note_usage(&self, index: usize) {
        if self.high_water.get() >= Some(index) {
            return;
        }

        self.high_water.set(Some(index));
        rt_info!("Using {} buffers", index + 1);
        if index + 1 == POOL_CAPACITY {
            rt_warn!(
                "All {} audio buffers are in use; one more without a release is fatal",
                POOL_CAPACITY
            );
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size())
            .field("slots_in_use", &self.slots_in_use())
            .field("high_water_mark", &self.high_water_mark())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn pool(size: usize) -> BufferPool {
        BufferPool::new(NonZeroUsize::new(size).unwrap())
    }

    /// Fill every handle with its own index so that overlapping regions would show up as wrong values.
    fn assert_disjoint(handles: &mut [BufferHandle]) {
        for (i, h) in handles.iter_mut().enumerate() {
            h.samples_mut().fill(i as f32);
        }

        for (i, h) in handles.iter().enumerate() {
            assert!(h.samples().iter().all(|&x| x == i as f32));
        }
    }

    #[test]
    fn test_allocate_covers_whole_slot() {
        let pool = pool(64);
        let h = pool.allocate();
        assert_eq!(h.len(), 64);
        assert_eq!(h.offset(), 0);
        assert_eq!(h.slot_index(), Some(0));
        assert_eq!(pool.reference_count(0), Some(1));
        assert_eq!(pool.slots_in_use(), 1);
    }

    #[test]
    fn test_full_pool_is_disjoint() {
        let pool = pool(64);
        let mut handles = (0..POOL_CAPACITY)
            .map(|_| pool.allocate())
            .collect::<Vec<_>>();

        let mut slots = handles
            .iter()
            .map(|h| h.slot_index().unwrap())
            .collect::<Vec<_>>();
        slots.sort_unstable();
        assert_eq!(slots, (0..POOL_CAPACITY).collect::<Vec<_>>());

        assert_disjoint(&mut handles);
        assert_eq!(pool.slots_in_use(), POOL_CAPACITY);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let pool = pool(16);
        let _handles = pool.allocate_multi::<POOL_CAPACITY>();

        assert_eq!(
            pool.try_allocate().unwrap_err(),
            PoolExhausted {
                capacity: POOL_CAPACITY,
                buffer_size: 16,
            }
        );
    }

    #[test]
    fn test_exhaustion_handler_can_be_intercepted() {
        let mut pool = pool(16);
        pool.set_exhaustion_handler(crate::panic_on_exhaustion);
        let _handles = pool.allocate_multi::<POOL_CAPACITY>();

        let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pool.allocate();
        }))
        .unwrap_err();

        let condition = payload
            .downcast_ref::<PoolExhausted>()
            .expect("Payload should be the exhaustion condition");
        assert_eq!(condition.capacity, POOL_CAPACITY);
    }

    #[test]
    fn test_release_all_then_reuse() {
        let pool = pool(64);
        let handles = pool.allocate_multi::<POOL_CAPACITY>();
        assert!(pool.try_allocate().is_err());

        std::mem::drop(handles);
        assert_eq!(pool.slots_in_use(), 0);

        let h = pool.allocate();
        assert_eq!(h.len(), 64);
        assert!(h.slot_index().unwrap() < POOL_CAPACITY);
    }

    #[test]
    fn test_clone_keeps_slot_busy() {
        let pool = pool(8);
        let a = pool.allocate();
        let b = a.clone();
        assert_eq!(pool.reference_count(0), Some(2));

        std::mem::drop(a);
        assert_eq!(pool.reference_count(0), Some(1));
        // Slot 0 is still taken, so the next allocation must land elsewhere.
        let c = pool.allocate();
        assert_eq!(c.slot_index(), Some(1));

        std::mem::drop(b);
        assert_eq!(pool.reference_count(0), Some(0));
        assert_eq!(pool.allocate().slot_index(), Some(0));
    }

    #[test]
    fn test_allocate_cleared() {
        let pool = pool(32);
        {
            let mut h = pool.allocate();
            h.samples_mut().fill(1.0);
        }

        let h = pool.allocate_cleared();
        assert_eq!(h.slot_index(), Some(0));
        assert!(h.samples().iter().all(|&x| x == 0.0));

        let multi = pool.allocate_multi_cleared::<3>();
        for h in multi.iter() {
            assert!(h.samples().iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_high_water_mark() {
        let pool = pool(4);
        assert_eq!(pool.high_water_mark(), 0);

        let a = pool.allocate_multi::<3>();
        assert_eq!(pool.high_water_mark(), 3);
        std::mem::drop(a);

        // Reusing low slots doesn't lower the mark.
        let _b = pool.allocate();
        assert_eq!(pool.high_water_mark(), 3);
    }

    #[test]
    fn test_resize_refused_with_live_handles() {
        let mut pool = pool(64);
        let h = pool.allocate();
        let s = h.slice(4..8);

        assert_eq!(
            pool.set_buffer_size(NonZeroUsize::new(128).unwrap()),
            Err(PoolError::HandlesOutstanding { live: 2 })
        );
        assert_eq!(pool.buffer_size(), 64);

        std::mem::drop((h, s));
        pool.set_buffer_size(NonZeroUsize::new(128).unwrap()).unwrap();
        assert_eq!(pool.buffer_size(), 128);
        assert_eq!(pool.high_water_mark(), 0);
        assert_eq!(pool.allocate().len(), 128);
    }

    #[test]
    fn test_released_handles_do_not_block_resize() {
        let mut pool = pool(64);
        let mut h = pool.allocate();
        h.release();
        assert!(pool.set_buffer_size(NonZeroUsize::new(32).unwrap()).is_ok());
    }
}
