//! Format negotiation.
//!
//! `select_format` is pure and deterministic: identical capabilities,
//! preferences and target always yield the identical selection. Logging of
//! degraded matches happens in `plan_outputs`, never in the selector itself.

use crate::config::NegotiationConfig;
use crate::errors::CameraError;
use crate::session::Attempt;
use crate::types::{DeviceCapabilities, OutputDescriptor, PixelFormat, Size, StreamRequest};
use serde::Serialize;

/// Result of matching one output purpose against the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatSelection {
    pub format: PixelFormat,
    pub size: Size,
    /// None of the preferred formats was supported; the device's first format was used
    pub fallback: bool,
}

/// Pick a pixel format and resolution for one output.
///
/// The first preferred format the device supports wins; otherwise the first
/// format the device reports. Among that format's sizes the one closest to
/// `target` (Euclidean on width/height) is chosen, ties going to the larger
/// area and then to reporting order. Without a target the largest area wins.
///
/// Returns `None` only when the device reports no format or no size for the
/// chosen format.
pub fn select_format(
    capabilities: &DeviceCapabilities,
    preferred: &[PixelFormat],
    target: Option<Size>,
) -> Option<FormatSelection> {
    let (support, fallback) = match preferred.iter().find_map(|format| {
        capabilities.formats.iter().find(|s| s.format == *format)
    }) {
        Some(support) => (support, false),
        None => (capabilities.formats.first()?, true),
    };

    let size = match target {
        Some(target) => closest_size(&support.sizes, target)?,
        None => largest_size(&support.sizes)?,
    };

    Some(FormatSelection {
        format: support.format,
        size,
        fallback,
    })
}

fn closest_size(sizes: &[Size], target: Size) -> Option<Size> {
    let mut best: Option<Size> = None;
    for size in sizes {
        best = match best {
            None => Some(*size),
            Some(current) => {
                let d = size.distance_squared(&target);
                let d_current = current.distance_squared(&target);
                if d < d_current || (d == d_current && size.area() > current.area()) {
                    Some(*size)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

fn largest_size(sizes: &[Size]) -> Option<Size> {
    let mut best: Option<Size> = None;
    for size in sizes {
        if best.map_or(true, |current| size.area() > current.area()) {
            best = Some(*size);
        }
    }
    best
}

/// Output set negotiated for one build attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputPlan {
    pub descriptors: Vec<OutputDescriptor>,
    pub video: Option<FormatSelection>,
    pub photo: Option<FormatSelection>,
    pub is_mirrored: bool,
}

impl OutputPlan {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Negotiate formats for every enabled use-case and produce the output set.
///
/// On `Attempt::Retry` the photo resolution is replaced by the negotiated
/// video resolution, a combination devices are known to accept.
pub fn plan_outputs(
    capabilities: &DeviceCapabilities,
    request: &StreamRequest,
    preferences: &NegotiationConfig,
    attempt: Attempt,
) -> Result<OutputPlan, CameraError> {
    let is_mirrored = capabilities.is_mirrored();

    let video = select_format(capabilities, &preferences.video_formats, request.target_video_size);
    let mut photo = select_format(capabilities, &preferences.photo_formats, request.target_photo_size);

    for (purpose, format) in degraded_outputs(request, video.as_ref(), photo.as_ref()) {
        log::warn!(
            "Couldn't find a preferred format for {} streams, using {} instead",
            purpose,
            format
        );
    }

    if attempt == Attempt::Retry {
        if let (Some(video), Some(photo)) = (video.as_ref(), photo.as_mut()) {
            log::info!("Trying to configure camera now with video resolution {} for photos", video.size);
            photo.size = video.size;
        }
    }

    let mut descriptors = Vec::new();

    if request.needs_video_output() {
        let video = video.ok_or_else(|| {
            CameraError::FormatUnavailable("device reports no size for video streams".to_string())
        })?;
        descriptors.push(OutputDescriptor::video(video.format, video.size, is_mirrored));
    }

    if request.wants_photo {
        let photo = photo.ok_or_else(|| {
            CameraError::FormatUnavailable("device reports no size for photo streams".to_string())
        })?;
        descriptors.push(OutputDescriptor::photo(photo.format, photo.size, is_mirrored));
    }

    if request.wants_preview {
        match request.preview_surface {
            Some(surface) => descriptors.push(OutputDescriptor::preview(surface, is_mirrored)),
            None => log::warn!("Native preview requested but no preview surface is ready, skipping preview output"),
        }
    }

    Ok(OutputPlan {
        descriptors,
        video,
        photo,
        is_mirrored,
    })
}

/// Requested outputs that fell back to a non-preferred format
fn degraded_outputs(
    request: &StreamRequest,
    video: Option<&FormatSelection>,
    photo: Option<&FormatSelection>,
) -> Vec<(&'static str, PixelFormat)> {
    let mut degraded = Vec::new();
    if let Some(video) = video.filter(|s| s.fallback && request.needs_video_output()) {
        degraded.push(("video", video.format));
    }
    if let Some(photo) = photo.filter(|s| s.fallback && request.wants_photo) {
        degraded.push(("photo", photo.format));
    }
    degraded
}
