use std::path::PathBuf;

pub type DepthsweepResult<T> = Result<T, DepthsweepError>;

#[derive(thiserror::Error, Debug)]
pub enum DepthsweepError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(
        "dimension mismatch: diffuse map is {diffuse_width}x{diffuse_height} \
         but depth map is {depth_width}x{depth_height}"
    )]
    DimensionMismatch {
        diffuse_width: u32,
        diffuse_height: u32,
        depth_width: u32,
        depth_height: u32,
    },

    #[error("unsupported animation type: '{0}'")]
    UnsupportedAnimationType(String),

    #[error("frame extraction error: {0}")]
    FrameExtraction(String),

    #[error("codec open error: {0}")]
    CodecOpen(String),

    #[error("codec write error: {0}")]
    CodecWrite(String),

    #[error("filesystem error at '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export canceled")]
    Canceled,

    #[error("an export to '{0}' is already in flight")]
    ExportInFlight(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DepthsweepError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn frame_extraction(msg: impl Into<String>) -> Self {
        Self::FrameExtraction(msg.into())
    }

    pub fn codec_open(msg: impl Into<String>) -> Self {
        Self::CodecOpen(msg.into())
    }

    pub fn codec_write(msg: impl Into<String>) -> Self {
        Self::CodecWrite(msg.into())
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Flat kind mirror, attached to `ExportState::Failed` for diagnostics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::UnsupportedAnimationType(_) => ErrorKind::UnsupportedAnimationType,
            Self::FrameExtraction(_) => ErrorKind::FrameExtraction,
            Self::CodecOpen(_) => ErrorKind::CodecOpen,
            Self::CodecWrite(_) => ErrorKind::CodecWrite,
            Self::FileSystem { .. } => ErrorKind::FileSystem,
            Self::Canceled => ErrorKind::Canceled,
            Self::ExportInFlight(_) => ErrorKind::ExportInFlight,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    DimensionMismatch,
    UnsupportedAnimationType,
    FrameExtraction,
    CodecOpen,
    CodecWrite,
    FileSystem,
    Canceled,
    ExportInFlight,
    Other,
}
