//! Offline block driver for `audio_buffers` and `process_data`.
//!
//! Runs a sine through a small chain (event-driven gain, mono to stereo fan-out, and a soft clipper applied to each half
//! of every block separately) on a thread marked as the audio thread, then writes what came out to a wave file.  With
//! `--resize-at`/`--resize-to` the pool's buffer size changes between two blocks, as it would from a device's
//! buffer-size callback.
mod cli_args;
mod driver;
mod stages;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use audio_buffers::config::POOL_CAPACITY;

fn write_wav(path: &Path, sample_rate: u32, frames: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for s in frames {
        writer.write_sample(*s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = cli_args::CliArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .init();
    audio_buffers::init_rt_logging();

    let config = driver::RunConfig::from_args(&args)?;
    log::info!(
        "Running {} blocks of {} frames with a buffer size of {}",
        config.blocks,
        config.block_size,
        config.buffer_size
    );

    let report = driver::run_on_audio_thread(config)?;
    audio_buffers::flush_rt_log();

    if report.rejected_blocks != 0 {
        log::warn!(
            "{} blocks were too big for the pool and were written as silence",
            report.rejected_blocks
        );
    }
    log::info!(
        "Used at most {} of {} buffers",
        report.high_water_mark,
        POOL_CAPACITY
    );

    write_wav(&args.output, args.sample_rate, &report.frames)
        .with_context(|| format!("While writing {}", args.output.display()))?;
    log::info!("Wrote {}", args.output.display());

    Ok(())
}
