//! The package of data handed to audio processors.
//!
//! Processors run on the audio thread, once per callback.  Formally, a processor is anything with a
//! `process(ProcessPayload<IN, E>) -> ProcessPayload<OUT, E>`; see [Processor].  The payload owns counted handles to
//! its channels, the block's events, and the frame count, and every reshaping operation on it (changing the channel
//! count, dropping the audio or the events, cutting out a range of frames) moves or clones handles rather than copying
//! samples.
//!
//! Nothing in here may be touched from any thread other than the one running the callback.  Another thread which wants
//! the audio or events needs a processor which copies them somewhere synchronized.
mod events;
mod payload;
mod processor;

pub use audio_buffers::{BufferHandle, BufferPool, InvalidRange, Samples, SamplesMut};
pub use events::SharedEvents;
pub use payload::ProcessPayload;
pub use processor::Processor;
