use crate::ProcessPayload;

/// Anything which can process a block of audio and events.
///
/// `IN` and `OUT` are channel counts: an effect turning mono into stereo is a `Processor<1, 2, E>`, an event-only
/// stage such as an arpeggiator is a `Processor<0, 0, E>`.  This must only be called from the audio thread, and must
/// not allocate, block, or lock.
///
/// Closures of the right shape are processors too.
pub trait Processor<const IN: usize, const OUT: usize, E> {
    fn process(&mut self, data: ProcessPayload<IN, E>) -> ProcessPayload<OUT, E>;
}

impl<F, const IN: usize, const OUT: usize, E> Processor<IN, OUT, E> for F
where
    F: FnMut(ProcessPayload<IN, E>) -> ProcessPayload<OUT, E>,
{
    fn process(&mut self, data: ProcessPayload<IN, E>) -> ProcessPayload<OUT, E> {
        self(data)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use audio_buffers::BufferPool;

    use super::*;

    /// Passes events through untouched and produces silence, like a synth slot with nothing loaded.
    struct Silence<'a> {
        pool: &'a BufferPool,
    }

    impl<E> Processor<0, 1, E> for Silence<'_> {
        fn process(&mut self, data: ProcessPayload<0, E>) -> ProcessPayload<1, E> {
            data.redirect_mono(self.pool.allocate_cleared())
        }
    }

    fn run<P: Processor<1, 1, ()>>(p: &mut P, data: ProcessPayload<1, ()>) -> ProcessPayload<1, ()> {
        p.process(data)
    }

    #[test]
    fn test_struct_processor() {
        let pool = BufferPool::new(NonZeroUsize::new(16).unwrap());
        let mut synth = Silence { pool: &pool };
        let out = synth.process(ProcessPayload::from_events(9u8, 12));
        assert_eq!(out.nframes(), 12);
        assert_eq!(out.events(), Some(&9));
        assert!(out.mono_handle().samples().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_closure_processor() {
        let pool = BufferPool::new(NonZeroUsize::new(4).unwrap());
        let mut h = pool.allocate();
        h.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        let mut double = |mut data: ProcessPayload<1, ()>| {
            for s in data.mono_samples_mut().iter_mut() {
                *s *= 2.0;
            }
            data
        };

        let out = run(&mut double, ProcessPayload::from_audio([h]));
        assert_eq!(&out.mono_handle().samples()[..], &[2.0, 4.0, 6.0, 8.0]);
    }
}
