use std::sync::Arc;
use std::thread;

use rubato::{FftFixedIn, Resampler as _};

use crate::models::audio_models::ChannelBuffers;
use crate::models::error::RecorderError;

/// Input frames per FFT render block.
const FFT_CHUNK_SIZE: usize = 1024;

/// FFT sub-chunks per block.
const FFT_SUB_CHUNKS: usize = 2;

/// Which offline renderer a recorder uses for rate conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererKind {
    /// Band-limited FFT resampling via `rubato`.
    #[default]
    Fft,
    /// Linear interpolation.
    Linear,
    /// No offline rendering in this environment; exports stay at the native rate.
    Unavailable,
}

/// Renders a whole recording to another sample rate in one pass.
///
/// Must return exactly `input.len()` channels of exactly `out_len` samples.
pub trait OfflineRenderer: Send + Sync {
    fn render(
        &self,
        input: &[Vec<f32>],
        in_rate: u32,
        out_rate: u32,
        out_len: usize,
    ) -> Result<ChannelBuffers, RecorderError>;
}

/// Output of [`Resampler::resample`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub buffers: ChannelBuffers,
    /// Rate the buffers are actually at.
    pub sample_rate: u32,
}

/// Converts accumulated channel buffers from the capture rate to the output
/// rate without changing the channel count.
#[derive(Clone)]
pub struct Resampler {
    renderer: Option<Arc<dyn OfflineRenderer>>,
}

impl Resampler {
    pub fn new(kind: RendererKind) -> Self {
        let renderer: Option<Arc<dyn OfflineRenderer>> = match kind {
            RendererKind::Fft => Some(Arc::new(FftRenderer)),
            RendererKind::Linear => Some(Arc::new(LinearRenderer)),
            RendererKind::Unavailable => None,
        };
        Self { renderer }
    }

    pub fn with_renderer(renderer: Arc<dyn OfflineRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }

    /// Whether offline rendering is possible at all.
    pub fn is_available(&self) -> bool {
        self.renderer.is_some()
    }

    /// Length of a channel of `in_len` samples after conversion.
    pub fn output_length(in_len: usize, in_rate: u32, out_rate: u32) -> usize {
        (out_rate as f64 * in_len as f64 / in_rate as f64).round() as usize
    }

    /// Convert `input` from `in_rate` to `out_rate`.
    ///
    /// Matching rates, an unavailable renderer or an empty channel list hand
    /// the input back untouched at `in_rate`.
    pub fn resample(
        &self,
        input: ChannelBuffers,
        in_rate: u32,
        out_rate: u32,
    ) -> Result<Resampled, RecorderError> {
        let passthrough = |buffers: ChannelBuffers| -> Result<Resampled, RecorderError> {
            Ok(Resampled {
                buffers,
                sample_rate: in_rate,
            })
        };

        if in_rate == out_rate || input.is_empty() {
            return passthrough(input);
        }
        let Some(renderer) = &self.renderer else {
            log::debug!("offline rendering unavailable, keeping {} Hz", in_rate);
            return passthrough(input);
        };
        if in_rate == 0 || out_rate == 0 {
            return Err(RecorderError::RenderFailed(format!(
                "cannot convert {} Hz to {} Hz",
                in_rate, out_rate
            )));
        }

        let out_len = Self::output_length(input[0].len(), in_rate, out_rate);
        if out_len == 0 {
            return Ok(Resampled {
                buffers: vec![Vec::new(); input.len()],
                sample_rate: out_rate,
            });
        }

        log::debug!(
            "rendering {} channels x {} frames from {} Hz to {} Hz",
            input.len(),
            input[0].len(),
            in_rate,
            out_rate
        );
        let buffers = renderer.render(&input, in_rate, out_rate, out_len)?;
        if buffers.len() != input.len() || buffers.iter().any(|c| c.len() != out_len) {
            return Err(RecorderError::RenderFailed(format!(
                "renderer returned {} channels, expected {} x {} frames",
                buffers.len(),
                input.len(),
                out_len
            )));
        }

        Ok(Resampled {
            buffers,
            sample_rate: out_rate,
        })
    }

    /// Run [`resample`](Self::resample) on a dedicated thread and hand the
    /// result to `on_complete` exactly once.
    pub fn spawn<F>(
        &self,
        input: ChannelBuffers,
        in_rate: u32,
        out_rate: u32,
        on_complete: F,
    ) -> Result<(), RecorderError>
    where
        F: FnOnce(Result<Resampled, RecorderError>) + Send + 'static,
    {
        let resampler = self.clone();
        thread::Builder::new()
            .name("recorder-resample".into())
            .spawn(move || on_complete(resampler.resample(input, in_rate, out_rate)))
            .map_err(|e| {
                RecorderError::ConfigurationFailed(format!("failed to spawn resample thread: {}", e))
            })?;
        Ok(())
    }
}

impl std::fmt::Debug for Resampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resampler")
            .field("available", &self.is_available())
            .finish()
    }
}

/// FFT-based offline renderer.
///
/// Feeds the whole recording through `rubato::FftFixedIn` block by block,
/// zero-padding the last block, drops the resampler's output delay and
/// truncates the overrun.
#[derive(Debug, Clone, Copy, Default)]
pub struct FftRenderer;

impl OfflineRenderer for FftRenderer {
    fn render(
        &self,
        input: &[Vec<f32>],
        in_rate: u32,
        out_rate: u32,
        out_len: usize,
    ) -> Result<ChannelBuffers, RecorderError> {
        let channels = input.len();
        if channels == 0 {
            return Ok(Vec::new());
        }
        let frames = input[0].len();

        let mut resampler = FftFixedIn::<f32>::new(
            in_rate as usize,
            out_rate as usize,
            FFT_CHUNK_SIZE,
            FFT_SUB_CHUNKS,
            channels,
        )
        .map_err(|e| RecorderError::RenderFailed(format!("resampler init failed: {}", e)))?;

        let delay = resampler.output_delay();
        let wanted = delay + out_len;
        let mut output: ChannelBuffers = vec![Vec::with_capacity(wanted); channels];
        let mut pos = 0;

        while output[0].len() < wanted {
            let needed = resampler.input_frames_next();
            let block: Vec<Vec<f32>> = input
                .iter()
                .map(|channel| {
                    let mut block = Vec::with_capacity(needed);
                    if pos < frames {
                        block.extend_from_slice(&channel[pos..(pos + needed).min(frames)]);
                    }
                    block.resize(needed, 0.0);
                    block
                })
                .collect();
            pos += needed;

            let rendered = resampler
                .process(&block, None)
                .map_err(|e| RecorderError::RenderFailed(format!("resampling failed: {}", e)))?;
            if rendered.first().map_or(true, Vec::is_empty) && pos >= frames {
                return Err(RecorderError::RenderFailed("renderer produced no output".into()));
            }
            for (out, channel) in output.iter_mut().zip(rendered) {
                out.extend_from_slice(&channel);
            }
        }

        for channel in &mut output {
            channel.drain(..delay);
            channel.truncate(out_len);
        }
        Ok(output)
    }
}

/// Linear interpolation renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRenderer;

impl OfflineRenderer for LinearRenderer {
    fn render(
        &self,
        input: &[Vec<f32>],
        in_rate: u32,
        out_rate: u32,
        out_len: usize,
    ) -> Result<ChannelBuffers, RecorderError> {
        let ratio = out_rate as f64 / in_rate as f64;

        Ok(input
            .iter()
            .map(|samples| {
                let Some(&last) = samples.last() else {
                    return vec![0.0; out_len];
                };
                let mut output = vec![0.0f32; out_len];
                for (i, sample) in output.iter_mut().enumerate() {
                    let source_index = i as f64 / ratio;
                    let index = source_index as usize;
                    let fraction = (source_index - index as f64) as f32;

                    *sample = if index + 1 < samples.len() {
                        samples[index] * (1.0 - fraction) + samples[index + 1] * fraction
                    } else {
                        last
                    };
                }
                output
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct FailingRenderer;

    impl OfflineRenderer for FailingRenderer {
        fn render(&self, _: &[Vec<f32>], _: u32, _: u32, _: usize) -> Result<ChannelBuffers, RecorderError> {
            Err(RecorderError::RenderFailed("boom".into()))
        }
    }

    struct ShortRenderer;

    impl OfflineRenderer for ShortRenderer {
        fn render(&self, input: &[Vec<f32>], _: u32, _: u32, out_len: usize) -> Result<ChannelBuffers, RecorderError> {
            Ok(vec![vec![0.0; out_len / 2]; input.len()])
        }
    }

    #[test]
    fn same_rate_is_passthrough() {
        let input = vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]];
        for kind in [RendererKind::Fft, RendererKind::Linear, RendererKind::Unavailable] {
            let out = Resampler::new(kind).resample(input.clone(), 44100, 44100).unwrap();
            assert_eq!(out.buffers, input);
            assert_eq!(out.sample_rate, 44100);
        }
    }

    #[test]
    fn unavailable_renderer_keeps_native_rate() {
        let input = vec![vec![0.5; 480]];
        let out = Resampler::new(RendererKind::Unavailable)
            .resample(input.clone(), 48000, 16000)
            .unwrap();
        assert_eq!(out.buffers, input);
        assert_eq!(out.sample_rate, 48000);
    }

    #[test]
    fn output_length_rounds() {
        assert_eq!(Resampler::output_length(100, 48000, 24000), 50);
        assert_eq!(Resampler::output_length(3, 44100, 16000), 1); // 1.088
        assert_eq!(Resampler::output_length(441, 44100, 48000), 480);
        assert_eq!(Resampler::output_length(5, 3, 2), 3); // 3.33
    }

    #[test]
    fn linear_upsample_2x() {
        let out = Resampler::new(RendererKind::Linear)
            .resample(vec![vec![0.0, 1.0]], 24000, 48000)
            .unwrap();

        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.buffers[0].len(), 4);
        assert_abs_diff_eq!(out.buffers[0][0], 0.0);
        assert_abs_diff_eq!(out.buffers[0][1], 0.5);
        assert_abs_diff_eq!(out.buffers[0][2], 1.0);
    }

    #[test]
    fn linear_downsample_keeps_channel_count() {
        let ramp: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = Resampler::new(RendererKind::Linear)
            .resample(vec![ramp.clone(), ramp], 48000, 24000)
            .unwrap();

        assert_eq!(out.buffers.len(), 2);
        assert!(out.buffers.iter().all(|c| c.len() == 50));
        assert_abs_diff_eq!(out.buffers[0][10], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn fft_output_has_exact_length() {
        let input = vec![vec![0.0; 44100], vec![0.0; 44100]];
        let out = Resampler::new(RendererKind::Fft)
            .resample(input, 44100, 16000)
            .unwrap();

        assert_eq!(out.sample_rate, 16000);
        assert_eq!(out.buffers.len(), 2);
        assert!(out.buffers.iter().all(|c| c.len() == 16000));
    }

    #[test]
    fn fft_preserves_dc_level() {
        let out = Resampler::new(RendererKind::Fft)
            .resample(vec![vec![0.5; 9600]], 48000, 24000)
            .unwrap();

        let channel = &out.buffers[0];
        assert_eq!(channel.len(), 4800);
        assert_abs_diff_eq!(channel[2400], 0.5, epsilon = 0.02);
    }

    #[test]
    fn fft_handles_input_shorter_than_a_block() {
        let out = Resampler::new(RendererKind::Fft)
            .resample(vec![vec![0.25; 10]], 8000, 16000)
            .unwrap();
        assert_eq!(out.buffers[0].len(), 20);
    }

    #[test]
    fn empty_input_resamples_to_empty() {
        let out = Resampler::new(RendererKind::Fft)
            .resample(vec![Vec::new(), Vec::new()], 48000, 16000)
            .unwrap();
        assert_eq!(out.buffers, vec![Vec::<f32>::new(), Vec::new()]);
        assert_eq!(out.sample_rate, 16000);
    }

    #[test]
    fn render_failure_surfaces() {
        let resampler = Resampler::with_renderer(Arc::new(FailingRenderer));
        let err = resampler.resample(vec![vec![0.0; 10]], 48000, 16000).unwrap_err();
        assert_eq!(err, RecorderError::RenderFailed("boom".into()));
    }

    #[test]
    fn short_render_is_rejected() {
        let resampler = Resampler::with_renderer(Arc::new(ShortRenderer));
        let err = resampler.resample(vec![vec![0.0; 300]], 48000, 16000).unwrap_err();
        assert!(matches!(err, RecorderError::RenderFailed(_)));
    }

    #[test]
    fn spawn_completes_once() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Resampler::new(RendererKind::Linear)
            .spawn(vec![vec![0.0; 10]], 10, 20, move |result| {
                tx.send(result).unwrap();
            })
            .unwrap();

        let result = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(result.buffers[0].len(), 20);
        assert_eq!(result.sample_rate, 20);
    }
}
