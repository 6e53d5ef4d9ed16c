//! Core value types shared by negotiation, session building and delivery.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Squared Euclidean distance between the two (width, height) points
    pub fn distance_squared(&self, other: &Size) -> u64 {
        let dw = self.width.abs_diff(other.width) as u64;
        let dh = self.height.abs_diff(other.height) as u64;
        dw * dw + dh * dh
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats a device may report for its output streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[serde(rename = "yuv_420_888")]
    Yuv420_888,
    Nv21,
    Jpeg,
    Heic,
    RawSensor,
    Private,
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420_888 => "yuv_420_888",
            PixelFormat::Nv21 => "nv21",
            PixelFormat::Jpeg => "jpeg",
            PixelFormat::Heic => "heic",
            PixelFormat::RawSensor => "raw_sensor",
            PixelFormat::Private => "private",
            PixelFormat::Yuyv => "yuyv",
            PixelFormat::Mjpeg => "mjpeg",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a physical camera, chosen by the view layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensFacing {
    Front,
    Back,
    External,
}

/// One supported pixel format and the resolutions the device can stream it at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSupport {
    pub format: PixelFormat,
    pub sizes: Vec<Size>,
}

impl FormatSupport {
    pub fn new(format: PixelFormat, sizes: Vec<Size>) -> Self {
        Self { format, sizes }
    }
}

/// Hardware-reported capabilities of one camera.
///
/// Queried fresh on every open; never cached across opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub lens_facing: LensFacing,
    /// Stream configuration map, in the order the device reports it
    pub formats: Vec<FormatSupport>,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl DeviceCapabilities {
    pub fn new(lens_facing: LensFacing, formats: Vec<FormatSupport>) -> Self {
        Self {
            lens_facing,
            formats,
            min_zoom: 1.0,
            max_zoom: 1.0,
        }
    }

    pub fn with_zoom_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Front-facing lenses produce mirrored output
    pub fn is_mirrored(&self) -> bool {
        self.lens_facing == LensFacing::Front
    }

    pub fn output_formats(&self) -> Vec<PixelFormat> {
        self.formats.iter().map(|f| f.format).collect()
    }

    pub fn output_sizes(&self, format: PixelFormat) -> Option<&[Size]> {
        self.formats
            .iter()
            .find(|f| f.format == format)
            .map(|f| f.sizes.as_slice())
    }

    pub fn supports(&self, format: PixelFormat) -> bool {
        self.formats.iter().any(|f| f.format == format)
    }

    /// Zoom range with non-finite bounds replaced by 1.0 and `min <= max`
    pub fn zoom_range(&self) -> (f32, f32) {
        let min = if self.min_zoom.is_finite() { self.min_zoom } else { 1.0 };
        let max = if self.max_zoom.is_finite() { self.max_zoom } else { 1.0 };
        (min.min(max), max.max(min))
    }

    /// Clamp a zoom factor into the range the device supports
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        let (min, max) = self.zoom_range();
        if zoom.is_nan() {
            return min;
        }
        zoom.clamp(min, max)
    }
}

/// Handle of an on-screen surface owned by the view layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// Use-cases requested for one configuration pass.
///
/// Immutable snapshot; a pass never reads live property fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub wants_video: bool,
    pub wants_photo: bool,
    pub wants_frame_processing: bool,
    pub wants_preview: bool,
    pub target_video_size: Option<Size>,
    pub target_photo_size: Option<Size>,
    /// On-screen surface the preview output binds to
    pub preview_surface: Option<SurfaceId>,
}

impl StreamRequest {
    /// Video output is needed for recording as well as for frame processing
    pub fn needs_video_output(&self) -> bool {
        self.wants_video || self.wants_frame_processing
    }

    pub fn is_empty(&self) -> bool {
        !self.needs_video_output() && !self.wants_photo && !self.wants_preview
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPurpose {
    Video,
    Photo,
    Preview,
}

impl OutputPurpose {
    /// Video and preview stream continuously; photo is single-shot
    pub fn is_repeating(&self) -> bool {
        matches!(self, OutputPurpose::Video | OutputPurpose::Preview)
    }
}

impl fmt::Display for OutputPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPurpose::Video => write!(f, "video"),
            OutputPurpose::Photo => write!(f, "photo"),
            OutputPurpose::Preview => write!(f, "preview"),
        }
    }
}

/// Where an output's images end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceRef {
    /// The on-screen preview surface, bound without an intermediate consumer
    Preview(SurfaceId),
    /// An off-screen image stream at a negotiated format and size
    Image { format: PixelFormat, size: Size },
}

/// One requested stream of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub purpose: OutputPurpose,
    pub surface: SurfaceRef,
    pub is_mirrored: bool,
    pub is_repeating: bool,
}

impl OutputDescriptor {
    pub fn video(format: PixelFormat, size: Size, is_mirrored: bool) -> Self {
        Self::new(OutputPurpose::Video, SurfaceRef::Image { format, size }, is_mirrored)
    }

    pub fn photo(format: PixelFormat, size: Size, is_mirrored: bool) -> Self {
        Self::new(OutputPurpose::Photo, SurfaceRef::Image { format, size }, is_mirrored)
    }

    pub fn preview(surface: SurfaceId, is_mirrored: bool) -> Self {
        Self::new(OutputPurpose::Preview, SurfaceRef::Preview(surface), is_mirrored)
    }

    fn new(purpose: OutputPurpose, surface: SurfaceRef, is_mirrored: bool) -> Self {
        Self {
            purpose,
            surface,
            is_mirrored,
            is_repeating: purpose.is_repeating(),
        }
    }

    /// Number of images the output's consumer may hold at once
    pub fn buffer_depth(&self) -> usize {
        if self.is_repeating {
            2
        } else {
            1
        }
    }

    pub fn size(&self) -> Option<Size> {
        match self.surface {
            SurfaceRef::Image { size, .. } => Some(size),
            SurfaceRef::Preview(_) => None,
        }
    }
}

/// A single image produced by the hardware into an image output
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sequence: u64,
    pub data: Bytes,
}

impl Image {
    pub fn new(size: Size, format: PixelFormat, sequence: u64, data: Bytes) -> Self {
        Self {
            width: size.width,
            height: size.height,
            format,
            sequence,
            data,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
