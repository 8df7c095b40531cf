//! The demo chain: a sine source, a gain driven by events, a mono to stereo panner, and a soft clipper.
use std::f32::consts::{FRAC_PI_4, TAU};

use audio_buffers::BufferPool;
use process_data::{ProcessPayload, Processor, SharedEvents};

/// Jump to `gain` at `frame`, counted from the start of the block.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GainChange {
    pub frame: usize,
    pub gain: f32,
}

pub type Events = SharedEvents<GainChange>;

pub struct Sine {
    /// In cycles, `[0, 1)`.
    phase: f32,
    increment: f32,
}

impl Sine {
    pub fn new(frequency: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            increment: frequency / sample_rate as f32,
        }
    }

    /// Allocate a mono buffer and render the block into it.
    pub fn render(&mut self, pool: &BufferPool, data: ProcessPayload<0, Events>) -> ProcessPayload<1, Events> {
        let nframes = data.nframes();
        let mut out = pool.allocate();

        {
            let mut samples = out.samples_mut();
            for s in samples[..nframes].iter_mut() {
                *s = (self.phase * TAU).sin();
                self.phase = (self.phase + self.increment).fract();
            }
        }

        data.redirect_mono(out)
    }
}

/// Applies [GainChange] events sample-accurately.  The gain holds across blocks until the next change.
pub struct Gain {
    current: f32,
}

impl Gain {
    pub fn new(initial: f32) -> Self {
        Self { current: initial }
    }
}

fn scale(samples: &mut [f32], gain: f32) {
    for s in samples {
        *s *= gain;
    }
}

impl Processor<1, 1, Events> for Gain {
    fn process(&mut self, mut data: ProcessPayload<1, Events>) -> ProcessPayload<1, Events> {
        let nframes = data.nframes();
        let events = data.events().cloned();

        {
            let mut samples = data.mono_samples_mut();
            let mut pos = 0;

            for change in events.iter().flat_map(|e| e.iter()) {
                let until = change.frame.clamp(pos, nframes);
                scale(&mut samples[pos..until], self.current);
                pos = until;
                self.current = change.gain;
            }

            scale(&mut samples[pos..nframes], self.current);
        }

        data
    }
}

/// Equal-power panner from mono to stereo.
pub struct Pan {
    left: f32,
    right: f32,
}

impl Pan {
    /// `position` runs from -1 (hard left) to 1 (hard right).
    pub fn new(position: f32) -> Self {
        let angle = (position.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
        Self {
            left: angle.cos(),
            right: angle.sin(),
        }
    }

    /// The left channel is the input's slot, scaled in place.  Only the right channel takes a new one.
    pub fn fan_out(&self, pool: &BufferPool, data: ProcessPayload<1, Events>) -> ProcessPayload<2, Events> {
        let nframes = data.nframes();
        let mut left = data.mono_handle().clone();
        let mut right = pool.allocate();

        {
            let mut left_samples = left.samples_mut();
            let mut right_samples = right.samples_mut();
            for (l, r) in left_samples[..nframes]
                .iter_mut()
                .zip(right_samples[..nframes].iter_mut())
            {
                *r = *l * self.right;
                *l *= self.left;
            }
        }

        data.redirect([left, right])
    }
}

/// `tanh` saturation, normalized so that full scale stays full scale.
pub struct SoftClip {
    drive: f32,
}

impl SoftClip {
    pub fn new(drive: f32) -> Self {
        Self { drive }
    }
}

impl<const N: usize> Processor<N, N, Events> for SoftClip {
    fn process(&mut self, mut data: ProcessPayload<N, Events>) -> ProcessPayload<N, Events> {
        let nframes = data.nframes();
        let norm = self.drive.tanh();

        for channel in 0..N {
            let mut samples = data.channel_samples_mut(channel);
            for s in samples[..nframes].iter_mut() {
                *s = (*s * self.drive).tanh() / norm;
            }
        }

        data
    }
}
