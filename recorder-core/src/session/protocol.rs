//! Messages exchanged between a recorder and its processing worker.
//!
//! Commands flow recorder → worker and are processed in the order sent.
//! Responses flow back and carry the [`RequestId`] of the command that
//! produced them, so concurrent requests of the same kind never steal each
//! other's results.

use std::fmt;

use crate::models::audio_models::{ChannelBuffers, ExportedAudio};
use crate::models::error::RecorderError;

/// Correlates a response with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Init,
    Record,
    GetBuffer,
    GetStatus,
    SetBuffer,
    Clear,
    ExportWav,
    Shutdown,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Record => "record",
            Self::GetBuffer => "getBuffer",
            Self::GetStatus => "getStatus",
            Self::SetBuffer => "setBuffer",
            Self::Clear => "clear",
            Self::ExportWav => "exportWav",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum Command {
    Init {
        sample_rate: u32,
        channels: usize,
    },
    Record {
        chunk: ChannelBuffers,
    },
    GetBuffer {
        id: RequestId,
    },
    GetStatus {
        id: RequestId,
    },
    SetBuffer {
        buffers: ChannelBuffers,
    },
    Clear,
    /// Encode `buffers` at `sample_rate`, or the accumulated recording at the
    /// native rate when they are `None`.
    ExportWav {
        id: RequestId,
        mime_type: String,
        sample_rate: Option<u32>,
        buffers: Option<ChannelBuffers>,
    },
    Shutdown,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Init { .. } => CommandKind::Init,
            Self::Record { .. } => CommandKind::Record,
            Self::GetBuffer { .. } => CommandKind::GetBuffer,
            Self::GetStatus { .. } => CommandKind::GetStatus,
            Self::SetBuffer { .. } => CommandKind::SetBuffer,
            Self::Clear => CommandKind::Clear,
            Self::ExportWav { .. } => CommandKind::ExportWav,
            Self::Shutdown => CommandKind::Shutdown,
        }
    }

    /// Request id for commands that expect a response.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::GetBuffer { id } | Self::GetStatus { id } | Self::ExportWav { id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Response {
    GetBuffer {
        id: RequestId,
        buffers: Result<ChannelBuffers, RecorderError>,
    },
    GetStatus {
        id: RequestId,
        rec_length: Result<usize, RecorderError>,
    },
    ExportWav {
        id: RequestId,
        exported: Result<ExportedAudio, RecorderError>,
    },
    /// A command without a response payload failed on the worker.
    Rejected {
        command: CommandKind,
        error: RecorderError,
    },
}

impl Response {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::GetBuffer { id, .. } | Self::GetStatus { id, .. } | Self::ExportWav { id, .. } => Some(*id),
            Self::Rejected { .. } => None,
        }
    }

    /// Build the failure response matching `command`.
    pub fn failure(command: &Command, error: RecorderError) -> Self {
        match *command {
            Command::GetBuffer { id } => Self::GetBuffer {
                id,
                buffers: Err(error),
            },
            Command::GetStatus { id } => Self::GetStatus {
                id,
                rec_length: Err(error),
            },
            Command::ExportWav { id, .. } => Self::ExportWav {
                id,
                exported: Err(error),
            },
            _ => Self::Rejected {
                command: command.kind(),
                error,
            },
        }
    }
}
