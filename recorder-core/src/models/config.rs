use crate::processing::resampler::RendererKind;
use crate::processing::wav_format::frame_layout;
use crate::traits::callbacks::{BufferCallback, ExportCallback};

/// Configuration for a recording session.
///
/// Immutable for the lifetime of a [`Recorder`](crate::session::recorder::Recorder):
/// changing the channel count means building a new recorder.
#[derive(Clone)]
pub struct RecorderConfig {
    /// Frames delivered per capture callback (default: 4096).
    pub frame_buffer_size: usize,

    /// Number of captured channels (default: 2).
    pub channels: u16,

    /// Rate the capture source delivers frames at, in Hz (default: 44100).
    pub native_sample_rate: u32,

    /// Desired output rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Mime type attached to exported blobs (default: `audio/wav`).
    pub mime_type: String,

    /// Offline renderer used when the native and output rates differ.
    pub renderer: RendererKind,

    /// Fallback callback for `get_buffer` / `get_input_buffer`.
    pub callback: Option<BufferCallback>,

    /// Fallback callback for `export_wav`.
    pub export_callback: Option<ExportCallback>,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.channels == 0 {
            return Err("channel count must be at least 1".into());
        }
        if self.native_sample_rate == 0 {
            return Err("native sample rate must be positive".into());
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        for (name, rate) in [("native sample rate", self.native_sample_rate), ("sample rate", self.sample_rate)] {
            if frame_layout(rate, self.channels).is_none() {
                return Err(format!(
                    "{} channels at a {} of {} Hz do not fit a WAV header",
                    self.channels, name, rate
                ));
            }
        }
        if self.frame_buffer_size == 0 {
            return Err("frame buffer size must be positive".into());
        }
        if self.mime_type.trim().is_empty() {
            return Err("mime type must not be empty".into());
        }
        Ok(())
    }

    /// Whether exports go through the resampler.
    pub fn needs_resampling(&self) -> bool {
        self.native_sample_rate != self.sample_rate
    }

    pub fn with_frame_buffer_size(mut self, frames: usize) -> Self {
        self.frame_buffer_size = frames;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_native_sample_rate(mut self, rate: u32) -> Self {
        self.native_sample_rate = rate;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_callback(mut self, callback: BufferCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_export_callback(mut self, callback: ExportCallback) -> Self {
        self.export_callback = Some(callback);
        self
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frame_buffer_size: 4096,
            channels: 2,
            native_sample_rate: 44100,
            sample_rate: 44100,
            mime_type: "audio/wav".into(),
            renderer: RendererKind::default(),
            callback: None,
            export_callback: None,
        }
    }
}

impl std::fmt::Debug for RecorderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderConfig")
            .field("frame_buffer_size", &self.frame_buffer_size)
            .field("channels", &self.channels)
            .field("native_sample_rate", &self.native_sample_rate)
            .field("sample_rate", &self.sample_rate)
            .field("mime_type", &self.mime_type)
            .field("renderer", &self.renderer)
            .field("callback", &self.callback.is_some())
            .field("export_callback", &self.export_callback.is_some())
            .finish()
    }
}
