//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use recorder_core::storage::file_sink::DEFAULT_FILE_NAME;
use recorder_core::RendererKind;

/// Record a synthesized tone and save it as a 16-bit PCM WAV file
#[derive(Parser, Debug)]
#[command(name = "recorder-demo")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Seconds to record
    #[arg(short = 's', long, default_value_t = 2.0)]
    pub seconds: f64,

    /// Channel count delivered by the tone source
    #[arg(short = 'c', long, default_value_t = 2)]
    pub channels: u16,

    /// Frames per chunk delivered by the tone source
    #[arg(long, value_name = "FRAMES", default_value_t = 4096)]
    pub frames: usize,

    /// Rate the tone source delivers at (Hz)
    #[arg(long, value_name = "HZ", default_value_t = 44100)]
    pub native_rate: u32,

    /// Rate of the exported WAV (Hz)
    #[arg(short = 'r', long, value_name = "HZ", default_value_t = 16000)]
    pub rate: u32,

    /// Tone frequency (Hz)
    #[arg(short = 'f', long, value_name = "HZ", default_value_t = 440.0)]
    pub frequency: f32,

    /// Resampling method
    #[arg(long, value_enum, default_value_t = RendererArg::Fft)]
    pub renderer: RendererArg,

    /// MIME tag attached to the export
    #[arg(long, default_value = "audio/wav")]
    pub mime_type: String,

    /// Directory the WAV and its metadata sidecar are written to
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// File name of the WAV
    #[arg(long, default_value = DEFAULT_FILE_NAME)]
    pub file_name: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererArg {
    Fft,
    Linear,
    /// Skip resampling and export at the native rate
    Passthrough,
}

impl From<RendererArg> for RendererKind {
    fn from(arg: RendererArg) -> Self {
        match arg {
            RendererArg::Fft => RendererKind::Fft,
            RendererArg::Linear => RendererKind::Linear,
            RendererArg::Passthrough => RendererKind::Unavailable,
        }
    }
}
