//! Frame sheets and rotating GIFs.
//!
//! Rotating renders arrive as one image with every frame laid out side by
//! side. [`split_into_frames`] cuts such a sheet into equal PNG frames and
//! [`frames_to_gif`] assembles frames into an endlessly looping GIF.

mod error;

use std::borrow::Cow;
use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, instrument};

pub use error::RenderError;

/// Display time of each GIF frame in milliseconds.
pub const FRAME_DELAY_MS: u16 = 100;

/// Orientation of the frames in a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetLayout {
    /// Frames laid out left to right.
    Horizontal,
    /// Frames stacked top to bottom.
    Vertical,
}

impl SheetLayout {
    /// Wider-than-tall sheets are horizontal, everything else vertical.
    #[must_use]
    pub fn detect(width: u32, height: u32) -> Self {
        if width > height {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }
}

/// Splits a sheet of `frame_count` frames into individual PNG images.
///
/// The sheet is cut along its longer axis (horizontal when wider than tall)
/// into slices of `len / frame_count` pixels. Leftover pixels at the far
/// end are discarded.
///
/// # Errors
///
/// Returns [`RenderError`] if `frame_count` is zero, the bytes cannot be
/// decoded, the sheet is shorter than `frame_count` pixels along the split
/// axis, or a frame cannot be re-encoded.
#[instrument(skip(image_bytes), fields(bytes = image_bytes.len()))]
pub fn split_into_frames(image_bytes: &[u8], frame_count: u32) -> Result<Vec<Vec<u8>>, RenderError> {
    if frame_count == 0 {
        return Err(RenderError::ZeroFrames);
    }

    let sheet = image::load_from_memory(image_bytes).map_err(RenderError::decode)?;
    let (width, height) = sheet.dimensions();
    let layout = SheetLayout::detect(width, height);
    let axis = match layout {
        SheetLayout::Horizontal => width,
        SheetLayout::Vertical => height,
    };
    let step = axis / frame_count;
    if step == 0 {
        return Err(RenderError::TooSmall {
            width,
            height,
            frames: frame_count,
        });
    }
    debug!(width, height, ?layout, step, "splitting sheet");

    (0..frame_count)
        .map(|index| {
            let offset = index * step;
            let frame = match layout {
                SheetLayout::Horizontal => sheet.crop_imm(offset, 0, step, height),
                SheetLayout::Vertical => sheet.crop_imm(0, offset, width, step),
            };
            encode_png(&frame).map_err(|e| RenderError::encode_png(index as usize, e))
        })
        .collect()
}

fn encode_png(frame: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    frame.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Assembles encoded frames into a looping GIF.
///
/// Every frame is shown for [`FRAME_DELAY_MS`] and the canvas is cleared to
/// the background before the next frame is drawn. The canvas takes the size
/// of the first frame.
///
/// # Errors
///
/// Returns [`RenderError`] if `frames` is empty, a frame cannot be decoded,
/// or a frame is larger than the GIF format allows.
#[instrument(skip(frames), fields(frames = frames.len()))]
pub fn frames_to_gif<B: AsRef<[u8]>>(frames: &[B]) -> Result<Vec<u8>, RenderError> {
    let first = frames.first().ok_or(RenderError::NoFrames)?;
    let first = image::load_from_memory(first.as_ref()).map_err(RenderError::decode)?;
    let (canvas_width, canvas_height) = gif_dimensions(first.width(), first.height())?;

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, canvas_width, canvas_height, &[])
            .map_err(RenderError::encode_gif)?;
        encoder
            .set_repeat(gif::Repeat::Infinite)
            .map_err(RenderError::encode_gif)?;

        for (index, bytes) in frames.iter().enumerate() {
            let decoded: Cow<'_, DynamicImage> = if index == 0 {
                Cow::Borrowed(&first)
            } else {
                Cow::Owned(image::load_from_memory(bytes.as_ref()).map_err(RenderError::decode)?)
            };
            let (width, height) = gif_dimensions(decoded.width(), decoded.height())?;
            let mut rgba = decoded.to_rgba8().into_raw();

            let mut frame = gif::Frame::from_rgba_speed(width, height, &mut rgba, 10);
            frame.delay = FRAME_DELAY_MS / 10;
            frame.dispose = gif::DisposalMethod::Background;
            encoder.write_frame(&frame).map_err(RenderError::encode_gif)?;
        }
    }
    Ok(out)
}

fn gif_dimensions(width: u32, height: u32) -> Result<(u16, u16), RenderError> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(RenderError::Oversized { width, height }),
    }
}

/// Splits a sheet and assembles the frames into a looping GIF.
///
/// # Errors
///
/// Returns the errors of [`split_into_frames`] and [`frames_to_gif`].
pub fn render_gif_from_frames(image_bytes: &[u8], frame_count: u32) -> Result<Vec<u8>, RenderError> {
    let frames = split_into_frames(image_bytes, frame_count)?;
    frames_to_gif(&frames)
}
