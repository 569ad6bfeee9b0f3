use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::models::audio_models::{ChannelBuffers, ExportedAudio};
use crate::models::error::RecorderError;
use crate::processing::accumulator::FrameAccumulator;
use crate::processing::wav_format;
use crate::session::protocol::{Command, CommandKind, Response};

/// The processing context: owns the accumulator and does the merge and
/// encode work off the real-time thread.
///
/// Commands are handled strictly in arrival order.
pub struct RecorderWorker {
    accumulator: Option<FrameAccumulator>,
    responses: Sender<Response>,
}

impl RecorderWorker {
    pub fn new(responses: Sender<Response>) -> Self {
        Self {
            accumulator: None,
            responses,
        }
    }

    /// Run the worker on a dedicated `recorder-worker` thread until it
    /// receives [`Command::Shutdown`] or every command sender is gone.
    pub fn spawn(
        commands: Receiver<Command>,
        responses: Sender<Response>,
    ) -> Result<thread::JoinHandle<()>, RecorderError> {
        thread::Builder::new()
            .name("recorder-worker".into())
            .spawn(move || Self::new(responses).run(commands))
            .map_err(|e| RecorderError::ConfigurationFailed(format!("failed to spawn worker thread: {}", e)))
    }

    fn run(mut self, commands: Receiver<Command>) {
        log::debug!("recorder worker started");
        while let Ok(command) = commands.recv() {
            if !self.handle(command) {
                break;
            }
        }

        // Anything still queued behind the shutdown gets an answer.
        for command in commands.try_iter() {
            if command.request_id().is_some() {
                self.respond(Response::failure(&command, RecorderError::WorkerUnavailable));
            }
        }
        log::debug!("recorder worker stopped");
    }

    /// Handle one command. Returns `false` once the worker should stop.
    pub fn handle(&mut self, command: Command) -> bool {
        log::trace!("worker handling {}", command.kind());
        match command {
            Command::Init {
                sample_rate,
                channels,
            } => {
                if self.accumulator.is_some() {
                    log::warn!("ignoring repeated init");
                    return true;
                }
                match FrameAccumulator::initialize(sample_rate, channels) {
                    Ok(acc) => {
                        log::debug!("accumulator ready: {} Hz, {} channels", sample_rate, channels);
                        self.accumulator = Some(acc);
                    }
                    Err(error) => self.reject(CommandKind::Init, error),
                }
            }
            Command::Record { chunk } => {
                if let Err(error) = self.accumulator_mut().and_then(|acc| acc.append(chunk)) {
                    self.reject(CommandKind::Record, error);
                }
            }
            Command::GetBuffer { id } => {
                let buffers = self.accumulator().map(FrameAccumulator::materialize);
                self.respond(Response::GetBuffer { id, buffers });
            }
            Command::GetStatus { id } => {
                let rec_length = self.accumulator().map(FrameAccumulator::rec_length);
                self.respond(Response::GetStatus { id, rec_length });
            }
            Command::SetBuffer { buffers } => {
                if let Err(error) = self.accumulator_mut().and_then(|acc| acc.replace(buffers)) {
                    self.reject(CommandKind::SetBuffer, error);
                }
            }
            Command::Clear => match self.accumulator_mut() {
                Ok(acc) => acc.clear(),
                Err(error) => self.reject(CommandKind::Clear, error),
            },
            Command::ExportWav {
                id,
                mime_type,
                sample_rate,
                buffers,
            } => {
                let exported = self.export_wav(mime_type, sample_rate, buffers);
                self.respond(Response::ExportWav { id, exported });
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn export_wav(
        &self,
        mime_type: String,
        sample_rate: Option<u32>,
        buffers: Option<ChannelBuffers>,
    ) -> Result<ExportedAudio, RecorderError> {
        let acc = self.accumulator()?;
        let buffers = match buffers {
            Some(buffers) => {
                if buffers.len() != acc.channels() {
                    return Err(RecorderError::ChannelMismatch {
                        expected: acc.channels(),
                        actual: buffers.len(),
                    });
                }
                buffers
            }
            None => acc.materialize(),
        };
        let sample_rate = sample_rate.unwrap_or(acc.sample_rate());
        let channels = acc.channels() as u16;

        let samples = wav_format::interleave(&buffers);
        let bytes = wav_format::encode_wav(&samples, sample_rate, channels)?;
        log::debug!(
            "encoded {} bytes ({} Hz, {} channels, {})",
            bytes.len(),
            sample_rate,
            channels,
            mime_type
        );

        Ok(ExportedAudio {
            bytes,
            mime_type,
            sample_rate,
            channels,
        })
    }

    fn accumulator(&self) -> Result<&FrameAccumulator, RecorderError> {
        self.accumulator.as_ref().ok_or(RecorderError::NotInitialized)
    }

    fn accumulator_mut(&mut self) -> Result<&mut FrameAccumulator, RecorderError> {
        self.accumulator.as_mut().ok_or(RecorderError::NotInitialized)
    }

    fn reject(&self, command: CommandKind, error: RecorderError) {
        log::warn!("{} rejected: {}", command, error);
        self.respond(Response::Rejected { command, error });
    }

    fn respond(&self, response: Response) {
        if self.responses.send(response).is_err() {
            log::debug!("response dropped, recorder is gone");
        }
    }
}
