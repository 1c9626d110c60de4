use std::io;

use thiserror::Error;
use typebridge_protocol::{FrameError, InstructionError};

/// Errors from talking to the bridge
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("bridge closed the connection")]
    Closed,

    #[error("no frame from the bridge within {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed frame from the bridge: {0:?}")]
    Frame(FrameError),

    #[error("instruction not available: {0:?}")]
    Instruction(InstructionError),

    #[error("move distance {0} exceeds {max}", max = crate::commands::MAX_DISTANCE)]
    DistanceOutOfRange(u32),

    #[error("print thickness {0} exceeds {max}", max = crate::commands::MAX_THICKNESS)]
    ThicknessOutOfRange(u8),

    #[error("image height {0} exceeds {max} rows", max = crate::image::MAX_IMAGE_HEIGHT)]
    ImageTooTall(u32),
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        ClientError::Frame(err)
    }
}

impl From<InstructionError> for ClientError {
    fn from(err: InstructionError) -> Self {
        ClientError::Instruction(err)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
