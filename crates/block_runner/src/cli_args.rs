//! Definition of the Clap command line.
use std::path::PathBuf;

use clap::Parser;

use audio_buffers::config::DEFAULT_BUFFER_SIZE;

/// Push a sine through a small processing chain one block at a time, as an audio callback would, and write the result
/// to a stereo wave file.
#[derive(Debug, Parser)]
pub struct CliArgs {
    /// Samples per pool slot.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Frames requested per block.  Defaults to the buffer size.
    ///
    /// Blocks bigger than the pool's buffer size are rejected and rendered as silence.
    #[arg(long)]
    pub block_size: Option<usize>,

    /// How many blocks to run.
    #[arg(long, default_value_t = 1000)]
    pub blocks: usize,

    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Frequency of the test tone, in Hz.
    #[arg(long, default_value_t = 440.0)]
    pub frequency: f32,

    /// Before running this block, change the pool's buffer size to `--resize-to`.
    #[arg(long, requires = "resize_to")]
    pub resize_at: Option<usize>,

    #[arg(long, requires = "resize_at")]
    pub resize_to: Option<usize>,

    #[arg(long, default_value = "block_runner.wav")]
    pub output: PathBuf,

    #[arg(long, default_value_t = log::LevelFilter::Info)]
    pub log_level: log::LevelFilter,
}
