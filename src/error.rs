use alloc::boxed::Box;
use alloc::string::String;

use crate::decode::DecodeOutput;
use crate::embedded::EmbeddedFormat;

/// Errors from BMP decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BitmapError {
    #[error("not a bitmap: missing BM magic bytes")]
    MalformedMagic,

    #[error("unsupported bitmap dialect: info header size {0}")]
    UnsupportedDialect(u32),

    #[error("unsupported compression code {0}")]
    UnsupportedCompression(u32),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid channel masks: {0}")]
    InvalidMaskConfiguration(String),

    /// The stream ended early. Structural (header) truncation carries no
    /// partial result; truncation inside the pixel data carries every row
    /// decoded so far.
    #[error("unexpected end of input after {rows_decoded} rows")]
    Truncated {
        rows_decoded: u32,
        partial: Option<Box<DecodeOutput>>,
    },

    #[error("cannot encode source: {0}")]
    UnencodableSource(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no embedded codec registered for {0:?} payloads")]
    MissingEmbeddedCodec(EmbeddedFormat),

    #[error("embedded {format:?} codec failed: {message}")]
    Embedded {
        format: EmbeddedFormat,
        message: String,
    },

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("buffer too small: need {needed} samples, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },
}

impl BitmapError {
    pub(crate) fn eof() -> Self {
        BitmapError::Truncated {
            rows_decoded: 0,
            partial: None,
        }
    }

    /// The partially decoded image carried by [`BitmapError::Truncated`].
    pub fn partial(&self) -> Option<&DecodeOutput> {
        match self {
            BitmapError::Truncated { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}
