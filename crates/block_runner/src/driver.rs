//! Drives the chain one block at a time, the way an audio callback would, except that the "device" is a `Vec`.
use std::f32::consts::TAU;
use std::num::NonZeroUsize;

use anyhow::{Context, Result};

use audio_buffers::{rt_error, rt_info, rt_warn, BufferPool};
use process_data::{ProcessPayload, Processor};

use crate::cli_args::CliArgs;
use crate::stages::{Events, Gain, GainChange, Pan, Sine, SoftClip};

/// The shared event list is preallocated to hold this many events.
const MAX_EVENTS_PER_BLOCK: usize = 4;

/// Rate of the tremolo which generates the gain events.
const TREMOLO_HZ: f32 = 3.0;

#[derive(Copy, Clone, Debug)]
pub struct Resize {
    pub at_block: usize,
    pub buffer_size: NonZeroUsize,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub buffer_size: NonZeroUsize,
    pub block_size: usize,
    pub blocks: usize,
    pub sample_rate: u32,
    pub frequency: f32,
    pub resize: Option<Resize>,
}

impl RunConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let buffer_size = NonZeroUsize::new(args.buffer_size).context("--buffer-size must be at least 1")?;
        let block_size = args.block_size.unwrap_or(buffer_size.get());
        anyhow::ensure!(block_size > 0, "--block-size must be at least 1");
        anyhow::ensure!(args.sample_rate > 0, "--sample-rate must be at least 1");

        let resize = match (args.resize_at, args.resize_to) {
            (Some(at_block), Some(to)) => Some(Resize {
                at_block,
                buffer_size: NonZeroUsize::new(to).context("--resize-to must be at least 1")?,
            }),
            _ => None,
        };

        let config = Self {
            buffer_size,
            block_size,
            blocks: args.blocks,
            sample_rate: args.sample_rate,
            frequency: args.frequency,
            resize,
        };
        config.output_len()?;
        Ok(config)
    }

    /// Interleaved stereo samples in the whole render.
    pub fn output_len(&self) -> Result<usize> {
        self.blocks
            .checked_mul(self.block_size)
            .and_then(|frames| frames.checked_mul(2))
            .with_context(|| {
                format!(
                    "{} blocks of {} frames is too much audio to hold in memory",
                    self.blocks, self.block_size
                )
            })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::IsVariant)]
pub enum BlockOutcome {
    Rendered,

    /// The block asked for more frames than a buffer holds, and was written as silence.
    Rejected,
}

#[derive(Debug)]
pub struct RunReport {
    /// Interleaved stereo.
    pub frames: Vec<f32>,
    pub rejected_blocks: usize,
    pub high_water_mark: usize,
}

/// Everything which survives from one block to the next.
pub struct BlockDriver {
    pool: BufferPool,
    events: Events,
    sine: Sine,
    gain: Gain,
    pan: Pan,
    clip: SoftClip,
    tremolo_phase: f32,
    tremolo_increment: f32,
}

impl BlockDriver {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            pool: BufferPool::new(config.buffer_size),
            events: Events::with_capacity(MAX_EVENTS_PER_BLOCK),
            sine: Sine::new(config.frequency, config.sample_rate),
            gain: Gain::new(1.0),
            pan: Pan::new(-0.3),
            clip: SoftClip::new(1.5),
            tremolo_phase: 0.0,
            tremolo_increment: TREMOLO_HZ / config.sample_rate as f32,
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Change the buffer size.  Only callable between blocks, since `&mut self` means no block is running.
    pub fn resize(&mut self, buffer_size: NonZeroUsize) -> Result<()> {
        self.pool
            .set_buffer_size(buffer_size)
            .context("Unable to resize the buffer pool")?;
        Ok(())
    }

    fn next_tremolo_gain(&mut self, nframes: usize) -> f32 {
        let gain = 0.6 + 0.4 * (self.tremolo_phase * TAU).sin();
        self.tremolo_phase = (self.tremolo_phase + self.tremolo_increment * nframes as f32).fract();
        gain
    }

    /// Run one block, appending `nframes` interleaved stereo frames to `output`.
    ///
    /// Does not allocate as long as `output` has room.
    pub fn run_block(&mut self, nframes: usize, output: &mut Vec<f32>) -> BlockOutcome {
        let out_len = output.len() + nframes * 2;

        if nframes > self.pool.buffer_size() {
            rt_error!(
                "Asked for {} frames, but buffers only hold {}",
                nframes,
                self.pool.buffer_size()
            );
            output.resize(out_len, 0.0);
            return BlockOutcome::Rejected;
        }

        let gain = self.next_tremolo_gain(nframes);
        match self.events.refill() {
            Some(list) => list.push(GainChange {
                frame: nframes / 2,
                gain,
            }),
            None => {
                rt_warn!("Events from the last block are still alive; replaying them");
            }
        }

        let data = ProcessPayload::from_events(self.events.clone(), nframes);
        let data = self.sine.render(&self.pool, data);
        let data = self.gain.process(data);
        let stereo = self.pan.fan_out(&self.pool, data);

        // The clipper works in place, so what comes back is just more handles on the same slots.
        let half = stereo.nframes() / 2;
        drop(self.clip.process(stereo.slice(..half)));
        drop(self.clip.process(stereo.slice(half..)));

        if stereo.nframes() != nframes {
            rt_warn!("Frames went missing! Wanted {}, got {}", nframes, stereo.nframes());
        }

        let [left, right] = stereo.raw_buffers();
        // Both pointers are good for `stereo.nframes()` samples while `stereo` is alive, and nothing holds a sample
        // guard on either slot.
        unsafe { interleave(left, right, stereo.nframes(), output) };
        output.resize(out_len, 0.0);

        BlockOutcome::Rendered
    }
}

/// # Safety
///
/// `left` and `right` must be valid for reads of `nframes` samples, with no live mutable borrow of either.
unsafe fn interleave(left: *const f32, right: *const f32, nframes: usize, output: &mut Vec<f32>) {
    let left = std::slice::from_raw_parts(left, nframes);
    let right = std::slice::from_raw_parts(right, nframes);
    for (l, r) in left.iter().zip(right) {
        output.push(*l);
        output.push(*r);
    }
}

/// Run every block on the current thread.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let mut driver = BlockDriver::new(config);
    let mut frames = Vec::new();
    frames
        .try_reserve_exact(config.output_len()?)
        .context("Unable to allocate the output buffer")?;
    let mut rejected_blocks = 0;

    for block in 0..config.blocks {
        if let Some(resize) = config.resize.filter(|r| r.at_block == block) {
            driver.resize(resize.buffer_size)?;
            rt_info!("Buffer size is now {} before block {}", resize.buffer_size, block);
        }

        if driver.run_block(config.block_size, &mut frames).is_rejected() {
            rejected_blocks += 1;
        }
    }

    Ok(RunReport {
        frames,
        rejected_blocks,
        high_water_mark: driver.pool().high_water_mark(),
    })
}

/// Run every block on a fresh thread marked as the audio thread, so that diagnostics take the realtime path.
pub fn run_on_audio_thread(config: RunConfig) -> Result<RunReport> {
    let thread = std::thread::Builder::new()
        .name("audio".into())
        .spawn(move || {
            audio_buffers::mark_audio_thread();
            run(&config)
        })
        .context("Unable to spawn the audio thread")?;

    thread
        .join()
        .map_err(|_| anyhow::anyhow!("The audio thread panicked"))?
}
