use std::ops::RangeBounds;
use std::rc::Rc;

use crate::pool::{PoolStorage, SlotState};
use crate::{resolve_range, InvalidRange};

/// One counted reference to one slot.
///
/// Existing is what holds the count: construction increments, clone increments, drop decrements.
pub(crate) struct SlotLink {
    storage: Rc<PoolStorage>,
    index: usize,
}

impl SlotLink {
    pub(crate) fn acquire(storage: Rc<PoolStorage>, index: usize) -> Self {
        storage.slot(index).incref();
        Self { storage, index }
    }

    fn state(&self) -> &SlotState {
        self.storage.slot(self.index)
    }
}

impl Clone for SlotLink {
    fn clone(&self) -> Self {
        Self::acquire(self.storage.clone(), self.index)
    }
}

impl Drop for SlotLink {
    fn drop(&mut self) {
        self.state().decref();
    }
}

/// A reference-counted view of `len` samples in one slot of a [crate::BufferPool].
///
/// Cloning is cheap and makes another view of the *same* memory; it does not copy samples.  The slot goes back to the
/// pool when the last handle on it (including slices) is dropped or released.
///
/// Sample access goes through [BufferHandle::samples] and [BufferHandle::samples_mut], which borrow exactly the viewed
/// range.  Any number of reads may overlap, and disjoint slices of one slot may be written at the same time, but a
/// mutable borrow overlapping any other live borrow panics.  Clones alias, so this is checked at runtime.
///
/// Handles stay on the thread which owns their pool:
///
/// ```compile_fail
/// use std::num::NonZeroUsize;
///
/// let pool = audio_buffers::BufferPool::new(NonZeroUsize::new(64).unwrap());
/// let handle = pool.allocate();
/// std::thread::spawn(move || handle.len());
/// ```
///
/// ```compile_fail
/// use std::num::NonZeroUsize;
///
/// let pool = audio_buffers::BufferPool::new(NonZeroUsize::new(64).unwrap());
/// let handle = pool.allocate();
/// std::thread::scope(|s| {
///     s.spawn(|| handle.get(0));
/// });
/// ```
pub struct BufferHandle {
    /// `None` once released.
    link: Option<SlotLink>,
    offset: usize,
    len: usize,
}

/// A shared borrow of a handle's samples.
pub struct Samples<'a> {
    state: &'a SlotState,
    entry: usize,
    data: &'a [f32],
}

/// An exclusive borrow of a handle's samples.
pub struct SamplesMut<'a> {
    state: &'a SlotState,
    entry: usize,
    data: &'a mut [f32],
}

impl BufferHandle {
    pub(crate) fn whole_slot(link: SlotLink, len: usize) -> Self {
        debug_assert!(len > 0);
        Self {
            link: Some(link),
            offset: 0,
            len,
        }
    }

    fn live_link(&self) -> &SlotLink {
        self.link
            .as_ref()
            .expect("Attempt to use an audio buffer handle after it was released")
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Has [BufferHandle::release] been called?
    pub fn is_released(&self) -> bool {
        self.link.is_none()
    }

    /// Where this view starts within its slot.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The slot this handle points into, or `None` once released.
    pub fn slot_index(&self) -> Option<usize> {
        self.link.as_ref().map(|l| l.index)
    }

    /// How many live handles point at this handle's slot, including this one.  0 once released.
    pub fn reference_count(&self) -> u32 {
        self.link.as_ref().map_or(0, |l| l.state().refcount())
    }

    /// Give the slot back now instead of at the end of the scope.
    ///
    /// The handle becomes inert: length 0, and any sample access panics.  Releasing twice is a no-op.
    pub fn release(&mut self) {
        self.link = None;
        self.offset = 0;
        self.len = 0;
    }

    /// Get a new counted handle over a sub-range of this one.
    ///
    /// The range is relative to this view, and an open end means "to the end".  Panics on out of bounds ranges or
    /// released handles.
    #[track_caller]
    pub fn slice(&self, range: impl RangeBounds<usize>) -> BufferHandle {
        match self.try_slice(range) {
            Ok(h) => h,
            Err(e) => panic!("{}", e),
        }
    }

    /// Like [BufferHandle::slice], but return out of bounds ranges as an error.
    pub fn try_slice(&self, range: impl RangeBounds<usize>) -> Result<BufferHandle, InvalidRange> {
        let link = self.live_link();
        let range = resolve_range(range, self.len)?;
        Ok(BufferHandle {
            link: Some(link.clone()),
            offset: self.offset + range.start,
            len: range.len(),
        })
    }

    /// Borrow the samples for reading.
    ///
    /// Panics if some handle holds a mutable borrow overlapping this view.
    #[track_caller]
    pub fn samples(&self) -> Samples<'_> {
        let link = self.live_link();
        let state = link.state();
        let entry = state.acquire_borrow(self.offset, self.offset + self.len, false);
        // The pointer is in bounds for `len` samples by construction, the Rc in the link keeps the storage alive for
        // as long as `&self`, and the borrow table rules out a live exclusive borrow overlapping this range.
        let data =
            unsafe { std::slice::from_raw_parts(link.storage.sample_ptr(link.index, self.offset), self.len) };
        Samples { state, entry, data }
    }

    /// Borrow the samples for writing.
    ///
    /// Panics if any live borrow overlaps this view, through this handle or any clone or slice on the same slot.
    #[track_caller]
    pub fn samples_mut(&mut self) -> SamplesMut<'_> {
        let link = self.live_link();
        let state = link.state();
        let entry = state.acquire_borrow(self.offset, self.offset + self.len, true);
        // As in `samples`, and the table rules out every other borrow overlapping this range.
        let data = unsafe {
            std::slice::from_raw_parts_mut(link.storage.sample_ptr(link.index, self.offset), self.len)
        };
        SamplesMut { state, entry, data }
    }

    #[track_caller]
    pub fn get(&self, index: usize) -> f32 {
        self.samples()[index]
    }

    #[track_caller]
    pub fn set(&mut self, index: usize, value: f32) {
        self.samples_mut()[index] = value;
    }

    /// Zero the viewed range.
    pub fn clear(&mut self) {
        self.samples_mut().fill(0.0);
    }

    /// Copy `src` into this view.  Panics if the lengths differ.
    pub fn copy_from_slice(&mut self, src: &[f32]) {
        self.samples_mut().copy_from_slice(src);
    }

    /// Raw pointer to the first sample, for APIs wanting flat arrays.  Null once released.
    ///
    /// Valid for `len()` samples until the last handle on the slot goes away or the pool is resized.  Nothing tracks
    /// accesses through it: using it while an overlapping [Samples] or [SamplesMut] is alive is undefined behavior.
    pub fn as_mut_ptr(&self) -> *mut f32 {
        self.link
            .as_ref()
            .map_or(std::ptr::null_mut(), |l| l.storage.sample_ptr(l.index, self.offset))
    }

    /// See [BufferHandle::as_mut_ptr].
    pub fn as_ptr(&self) -> *const f32 {
        self.as_mut_ptr()
    }
}

impl Clone for BufferHandle {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("slot", &self.slot_index())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("reference_count", &self.reference_count())
            .finish()
    }
}

impl std::ops::Deref for Samples<'_> {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl Drop for Samples<'_> {
    fn drop(&mut self) {
        self.state.release_borrow(self.entry);
    }
}

impl std::ops::Deref for SamplesMut<'_> {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl std::ops::DerefMut for SamplesMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}

impl Drop for SamplesMut<'_> {
    fn drop(&mut self) {
        self.state.release_borrow(self.entry);
    }
}
