//! Synthetic images and device capabilities.
//!
//! The capability tables mirror what a typical phone back camera and a USB
//! webcam report, so negotiation runs against realistic size lists without
//! hardware attached.

use crate::types::{DeviceCapabilities, FormatSupport, Image, LensFacing, PixelFormat, Size};
use bytes::Bytes;

/// Payload is downsampled by this factor in each dimension
const PAYLOAD_SCALE: u32 = 8;

/// Create a synthetic image whose content changes every sequence number.
///
/// Only a downsampled gradient is generated; consumers in this crate never
/// decode the payload.
pub fn synthetic_image(sequence: u64, size: Size, format: PixelFormat) -> Image {
    let width = (size.width / PAYLOAD_SCALE).max(1);
    let height = (size.height / PAYLOAD_SCALE).max(1);
    let base = (sequence % 256) as u8;

    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(base.wrapping_add(((x + y) % 256) as u8));
        }
    }

    Image::new(size, format, sequence, Bytes::from(data))
}

/// Back camera with YUV, JPEG and PRIVATE streams and 1x-8x zoom
pub fn synthetic_capabilities() -> DeviceCapabilities {
    DeviceCapabilities::new(
        LensFacing::Back,
        vec![
            FormatSupport::new(
                PixelFormat::Private,
                vec![Size::new(1920, 1080), Size::new(1280, 720)],
            ),
            FormatSupport::new(
                PixelFormat::Yuv420_888,
                vec![
                    Size::new(3840, 2160),
                    Size::new(1920, 1080),
                    Size::new(1280, 720),
                    Size::new(640, 480),
                ],
            ),
            FormatSupport::new(
                PixelFormat::Jpeg,
                vec![
                    Size::new(4032, 3024),
                    Size::new(3840, 2160),
                    Size::new(1920, 1080),
                ],
            ),
        ],
    )
    .with_zoom_range(1.0, 8.0)
}

/// Front camera; outputs are mirrored and zoom is limited
pub fn synthetic_front_capabilities() -> DeviceCapabilities {
    DeviceCapabilities::new(
        LensFacing::Front,
        vec![
            FormatSupport::new(
                PixelFormat::Yuv420_888,
                vec![Size::new(1920, 1080), Size::new(1280, 720)],
            ),
            FormatSupport::new(PixelFormat::Jpeg, vec![Size::new(3264, 2448), Size::new(1920, 1080)]),
        ],
    )
    .with_zoom_range(1.0, 2.0)
}

/// USB webcam reporting only MJPEG and YUYV, like a UVC device
pub fn synthetic_webcam_capabilities() -> DeviceCapabilities {
    DeviceCapabilities::new(
        LensFacing::External,
        vec![
            FormatSupport::new(
                PixelFormat::Mjpeg,
                vec![Size::new(1920, 1080), Size::new(1280, 720), Size::new(640, 480)],
            ),
            FormatSupport::new(PixelFormat::Yuyv, vec![Size::new(640, 480)]),
        ],
    )
}
