//! The job lifecycle as a tagged state machine.
//!
//! ```text
//!   Ready --execute(FIRST)--> Streaming --execute(LAST)--> Done
//!     \______________execute(FIRST|LAST)__________________/
//!   Done --reinit--> Ready
//! ```
//!
//! `Ready` holds the armed operation (if any); `Streaming` holds the carried stream
//! state; `Done` holds nothing. Chunk flags are checked against the phase before any
//! work is done, so a misordered chunk never touches the carried state.

use crate::error::ProtocolError;
use crate::job::stream::Stream;
use crate::job::Operation;
use crate::types::ChunkFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Ready,
    Streaming,
    Done,
}

pub(crate) enum JobState<'a> {
    Ready(Option<Operation<'a>>),
    Streaming(Box<Stream>),
    Done,
}

impl JobState<'_> {
    pub(crate) fn phase(&self) -> JobPhase {
        match self {
            JobState::Ready(_) => JobPhase::Ready,
            JobState::Streaming(_) => JobPhase::Streaming,
            JobState::Done => JobPhase::Done,
        }
    }
}

/// Checks that a chunk with `flags` may be executed in `phase`.
pub(crate) fn check_chunk(phase: JobPhase, armed: bool, flags: ChunkFlags) -> Result<(), ProtocolError> {
    match phase {
        JobPhase::Done => Err(ProtocolError::StreamFinished),
        JobPhase::Ready if !armed => Err(ProtocolError::NoOperation),
        JobPhase::Ready if !flags.contains(ChunkFlags::FIRST) => Err(ProtocolError::MissingFirst),
        JobPhase::Streaming if flags.contains(ChunkFlags::FIRST) => {
            Err(ProtocolError::FirstWithCarriedState)
        }
        _ => Ok(()),
    }
}

/// The phase a successful chunk leaves the job in.
pub(crate) fn next_phase(flags: ChunkFlags) -> JobPhase {
    if flags.contains(ChunkFlags::LAST) {
        JobPhase::Done
    } else {
        JobPhase::Streaming
    }
}
