use std::ops::RangeBounds;

use audio_buffers::{resolve_range, BufferHandle, InvalidRange, SamplesMut};

/// `N` channels of audio, the block's events, and the number of frames to process.
///
/// `E` is the event sequence.  It is opaque here: never inspected, never mutated, only moved (or cloned, by
/// [ProcessPayload::slice]).  [crate::SharedEvents] is the usual choice.
///
/// Invariant: `nframes` is no more than the length of any channel which has not been released.  Channels can't be
/// swapped out in place, only written through [ProcessPayload::channel_samples_mut] or released; a different set of
/// handles means a new payload via [ProcessPayload::redirect], which checks lengths again.
///
/// There are no separate types for the event-only (`N = 0`) and mono (`N = 1`) cases.  `[BufferHandle; 0]` takes no
/// space and `[BufferHandle; 1]` is laid out as a bare handle, so the array already is the specialization.
///
/// There is no way to swap a channel's handle for a shorter one in place:
///
/// ```compile_fail
/// use std::num::NonZeroUsize;
///
/// use process_data::{BufferPool, ProcessPayload};
///
/// let pool = BufferPool::new(NonZeroUsize::new(64).unwrap());
/// let mut p = ProcessPayload::<1, ()>::from_audio([pool.allocate()]);
/// p.audio_mut()[0] = pool.allocate().slice(..8);
/// ```
pub struct ProcessPayload<const N: usize, E> {
    audio: [BufferHandle; N],
    events: Option<E>,
    nframes: usize,
}

fn check_frames(audio: &[BufferHandle], nframes: usize) -> Result<(), InvalidRange> {
    match audio.iter().find(|h| h.len() < nframes) {
        Some(short) => Err(InvalidRange {
            start: 0,
            end: nframes,
            len: short.len(),
        }),
        None => Ok(()),
    }
}

impl<const N: usize, E> ProcessPayload<N, E> {
    /// Panics if any channel is shorter than `nframes`.
    #[track_caller]
    pub fn new(audio: [BufferHandle; N], events: E, nframes: usize) -> Self {
        match Self::try_new(audio, Some(events), nframes) {
            Ok(p) => p,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(audio: [BufferHandle; N], events: Option<E>, nframes: usize) -> Result<Self, InvalidRange> {
        check_frames(&audio, nframes)?;
        Ok(Self {
            audio,
            events,
            nframes,
        })
    }

    /// Build a payload without events, processing as many frames as the shortest channel has.
    pub fn from_audio(audio: [BufferHandle; N]) -> Self {
        let nframes = audio.iter().map(|h| h.len()).min().unwrap_or(0);
        Self {
            audio,
            events: None,
            nframes,
        }
    }

    /// Replace the events, keeping the audio.
    pub fn with_events(self, events: E) -> Self {
        Self {
            events: Some(events),
            ..self
        }
    }

    pub fn channels(&self) -> usize {
        N
    }

    pub fn nframes(&self) -> usize {
        self.nframes
    }

    pub fn audio(&self) -> &[BufferHandle; N] {
        &self.audio
    }

    pub fn channel(&self, index: usize) -> &BufferHandle {
        &self.audio[index]
    }

    /// Write one channel.  The view is the channel's whole handle, which is at least `nframes` long.
    ///
    /// Panics if the channel was released, or on a conflicting borrow (see [BufferHandle::samples_mut]).
    #[track_caller]
    pub fn channel_samples_mut(&mut self, index: usize) -> SamplesMut<'_> {
        self.audio[index].samples_mut()
    }

    /// Give a channel's slot back before the payload is done.
    ///
    /// The channel stays in place but inert: [BufferHandle::is_released] is true, its raw pointer is null, and touching
    /// its samples panics.
    pub fn release_channel(&mut self, index: usize) {
        self.audio[index].release();
    }

    pub fn events(&self) -> Option<&E> {
        self.events.as_ref()
    }

    pub fn has_events(&self) -> bool {
        self.events.is_some()
    }

    pub fn into_parts(self) -> ([BufferHandle; N], Option<E>, usize) {
        (self.audio, self.events, self.nframes)
    }

    /// Drop the events, keeping the audio and frame count.
    pub fn audio_only(self) -> Self {
        Self {
            events: None,
            ..self
        }
    }

    /// Drop the audio, keeping the events and frame count.
    ///
    /// The frame count survives because event timing may still matter downstream.
    pub fn events_only(self) -> ProcessPayload<0, E> {
        ProcessPayload {
            audio: [],
            events: self.events,
            nframes: self.nframes,
        }
    }

    /// Swap the channels for `handles`, keeping the events and the frame count.
    ///
    /// This is how a stage fans audio in or out without copying: a mono effect in a stereo chain can, for example,
    /// redirect its one output handle into both channels.  Panics if a handle is shorter than the frame count.
    #[track_caller]
    pub fn redirect<const M: usize>(self, handles: [BufferHandle; M]) -> ProcessPayload<M, E> {
        match self.try_redirect(handles) {
            Ok(p) => p,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_redirect<const M: usize>(
        self,
        handles: [BufferHandle; M],
    ) -> Result<ProcessPayload<M, E>, InvalidRange> {
        ProcessPayload::try_new(handles, self.events, self.nframes)
    }

    #[track_caller]
    pub fn redirect_mono(self, handle: BufferHandle) -> ProcessPayload<1, E> {
        self.redirect([handle])
    }

    /// Get a payload over a range of this one's frames.
    ///
    /// The range is in frames of this payload, and an open end means the remainder.  Every channel is sliced to the
    /// range and the frame count becomes its length.
    ///
    /// The events are *not* re-windowed: the slice carries the same events as this payload, with the same timestamps.
    /// Offsetting event times into the slice is up to the caller.
    ///
    /// Panics if the range runs past the frame count.
    #[track_caller]
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self
    where
        E: Clone,
    {
        match self.try_slice(range) {
            Ok(p) => p,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_slice(&self, range: impl RangeBounds<usize>) -> Result<Self, InvalidRange>
    where
        E: Clone,
    {
        let range = resolve_range(range, self.nframes)?;
        // Released channels stay released; the rest are at least nframes long, so this can't go out of bounds.
        let audio = std::array::from_fn(|i| {
            let h = &self.audio[i];
            if h.is_released() {
                h.clone()
            } else {
                h.slice(range.clone())
            }
        });

        Ok(Self {
            audio,
            events: self.events.clone(),
            nframes: range.len(),
        })
    }

    /// One raw pointer per channel, for callback APIs that want a flat array of channel pointers.
    ///
    /// Each pointer is valid for [ProcessPayload::nframes] samples while this payload is alive, except that released
    /// channels give null.  See
    /// [BufferHandle::as_mut_ptr] for the rules on using them.
    pub fn raw_buffers(&self) -> [*mut f32; N] {
        std::array::from_fn(|i| self.audio[i].as_mut_ptr())
    }
}

impl<E> ProcessPayload<0, E> {
    /// A payload with no audio at all.
    pub fn from_events(events: E, nframes: usize) -> Self {
        Self {
            audio: [],
            events: Some(events),
            nframes,
        }
    }
}

impl<E> ProcessPayload<1, E> {
    #[track_caller]
    pub fn mono(audio: BufferHandle, events: E, nframes: usize) -> Self {
        Self::new([audio], events, nframes)
    }

    pub fn mono_handle(&self) -> &BufferHandle {
        &self.audio[0]
    }

    #[track_caller]
    pub fn mono_samples_mut(&mut self) -> SamplesMut<'_> {
        self.channel_samples_mut(0)
    }
}

impl<const N: usize, E: std::fmt::Debug> std::fmt::Debug for ProcessPayload<N, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPayload")
            .field("audio", &self.audio)
            .field("events", &self.events)
            .field("nframes", &self.nframes)
            .finish()
    }
}
