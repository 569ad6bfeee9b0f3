/// Per-channel sample buffers, one `Vec<f32>` per channel.
///
/// Channels are always length-synchronized.
pub type ChannelBuffers = Vec<Vec<f32>>;

/// Progress of the current recording, as reported by the processing worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderStatus {
    /// Frames accumulated per channel.
    pub rec_length: usize,
    /// `rec_length` expressed in seconds at the native capture rate.
    pub duration_secs: f64,
}

impl RecorderStatus {
    pub fn new(rec_length: usize, native_sample_rate: u32) -> Self {
        let duration_secs = if native_sample_rate == 0 {
            0.0
        } else {
            rec_length as f64 / native_sample_rate as f64
        };
        Self {
            rec_length,
            duration_secs,
        }
    }
}

/// An encoded WAV blob, handed to the caller's export callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Rate written to the header (post-resample if resampled).
    pub sample_rate: u32,
    pub channels: u16,
}

impl ExportedAudio {
    /// Length of the PCM payload in seconds.
    pub fn duration_secs(&self) -> f64 {
        let block_align = self.channels as usize * 2;
        if self.sample_rate == 0 || block_align == 0 {
            return 0.0;
        }
        let data_bytes = self
            .bytes
            .len()
            .saturating_sub(crate::processing::wav_format::WAV_HEADER_SIZE);
        (data_bytes / block_align) as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn status_duration_uses_native_rate() {
        let status = RecorderStatus::new(22050, 44100);
        assert_relative_eq!(status.duration_secs, 0.5);
    }

    #[test]
    fn status_zero_rate_has_zero_duration() {
        assert_eq!(RecorderStatus::new(100, 0).duration_secs, 0.0);
    }

    #[test]
    fn exported_duration_from_payload() {
        let exported = ExportedAudio {
            bytes: vec![0; 44 + 8000 * 2 * 2],
            mime_type: "audio/wav".into(),
            sample_rate: 8000,
            channels: 2,
        };
        assert_relative_eq!(exported.duration_secs(), 1.0);
    }
}
