//! Error types for frame splitting and GIF assembly.

use thiserror::Error;

/// Errors that can occur while splitting sheets or encoding GIFs.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Frame count of zero was requested.
    #[error("frame count must be at least 1")]
    ZeroFrames,

    /// No frames were supplied to the GIF encoder.
    #[error("cannot build a GIF from an empty frame list")]
    NoFrames,

    /// The image is too small along the split axis for the requested frame count.
    #[error("image of {width}x{height} cannot be split into {frames} frames")]
    TooSmall {
        /// Source width in pixels.
        width: u32,
        /// Source height in pixels.
        height: u32,
        /// Requested frame count.
        frames: u32,
    },

    /// A frame exceeds the 65535 pixel limit of the GIF format.
    #[error("frame of {width}x{height} exceeds GIF dimensions")]
    Oversized {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
    },

    /// Decoding an input image failed.
    #[error("failed to decode image: {source}")]
    Decode {
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Encoding a PNG frame failed.
    #[error("failed to encode frame {index} as PNG: {source}")]
    EncodePng {
        /// Zero-based frame index.
        index: usize,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Encoding the GIF failed.
    #[error("failed to encode GIF: {source}")]
    EncodeGif {
        /// Underlying encoder error.
        #[source]
        source: gif::EncodingError,
    },
}

impl RenderError {
    /// Creates a decode error.
    pub fn decode(source: image::ImageError) -> Self {
        Self::Decode { source }
    }

    /// Creates a PNG encode error for frame `index`.
    pub fn encode_png(index: usize, source: image::ImageError) -> Self {
        Self::EncodePng { index, source }
    }

    /// Creates a GIF encode error.
    pub fn encode_gif(source: gif::EncodingError) -> Self {
        Self::EncodeGif { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_small_display() {
        let err = RenderError::TooSmall {
            width: 3,
            height: 2,
            frames: 16,
        };
        assert_eq!(err.to_string(), "image of 3x2 cannot be split into 16 frames");
    }

    #[test]
    fn test_zero_frames_display() {
        assert_eq!(
            RenderError::ZeroFrames.to_string(),
            "frame count must be at least 1"
        );
    }
}
