use thiserror::Error;
use villacore::framing::FrameError;
use villacore::package::PackageError;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Socket is closed")]
    Closed,
    #[error("failed to encode package: {0}")]
    Package(#[from] PackageError),
    #[error("failed to frame package: {0}")]
    Frame(#[from] FrameError),
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RecvError {
    #[error("Socket is closed")]
    Closed,
    /// The stream can no longer be trusted to be frame aligned.
    #[error("corrupt frame: {0}")]
    Frame(#[from] FrameError),
    /// Only this frame is affected; the stream is still usable.
    #[error("undecodable package (biz type {biz_type}): {source}")]
    Package {
        biz_type: u32,
        #[source]
        source: PackageError,
    },
}

impl RecvError {
    /// Whether the session has to be dropped after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Package { .. })
    }
}
