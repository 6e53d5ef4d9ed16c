//! Property-Based Tests for format negotiation
//!
//! These tests verify invariants of the format selector and output planner
//! using proptest for input generation and shrinking.
//!
//! Run with: cargo test --test negotiation_props

use crabcamera_session::config::NegotiationConfig;
use crabcamera_session::negotiation::{plan_outputs, select_format};
use crabcamera_session::session::Attempt;
use crabcamera_session::types::{
    DeviceCapabilities, FormatSupport, LensFacing, OutputPurpose, PixelFormat, Size, StreamRequest,
};
use proptest::prelude::*;

fn pixel_format() -> impl Strategy<Value = PixelFormat> {
    prop_oneof![
        Just(PixelFormat::Yuv420_888),
        Just(PixelFormat::Nv21),
        Just(PixelFormat::Jpeg),
        Just(PixelFormat::Heic),
        Just(PixelFormat::RawSensor),
        Just(PixelFormat::Private),
        Just(PixelFormat::Yuyv),
        Just(PixelFormat::Mjpeg),
    ]
}

fn size() -> impl Strategy<Value = Size> {
    (1u32..5000, 1u32..4000).prop_map(|(w, h)| Size::new(w, h))
}

fn capabilities() -> impl Strategy<Value = DeviceCapabilities> {
    (
        prop::collection::vec((pixel_format(), prop::collection::vec(size(), 1..12)), 1..5),
        any::<bool>(),
    )
        .prop_map(|(formats, front)| {
            let mut seen = Vec::new();
            let formats = formats
                .into_iter()
                .filter(|(format, _)| {
                    if seen.contains(format) {
                        false
                    } else {
                        seen.push(*format);
                        true
                    }
                })
                .map(|(format, sizes)| FormatSupport::new(format, sizes))
                .collect();
            let facing = if front { LensFacing::Front } else { LensFacing::Back };
            DeviceCapabilities::new(facing, formats)
        })
}

proptest! {
    /// INVARIANT: Selection is deterministic
    #[test]
    fn selection_is_deterministic(
        caps in capabilities(),
        preferred in prop::collection::vec(pixel_format(), 0..4),
        target in prop::option::of(size()),
    ) {
        let first = select_format(&caps, &preferred, target);
        let second = select_format(&caps, &preferred, target);
        prop_assert_eq!(first, second);
    }

    /// INVARIANT: The chosen size is one the device reported for the chosen format
    #[test]
    fn selection_comes_from_device(
        caps in capabilities(),
        preferred in prop::collection::vec(pixel_format(), 0..4),
        target in prop::option::of(size()),
    ) {
        let selection = select_format(&caps, &preferred, target).unwrap();
        let sizes = caps.output_sizes(selection.format).unwrap();
        prop_assert!(sizes.contains(&selection.size));
    }

    /// INVARIANT: Fallback is flagged exactly when no preferred format is supported,
    /// and then the device's first format is used
    #[test]
    fn fallback_flag_is_exact(
        caps in capabilities(),
        preferred in prop::collection::vec(pixel_format(), 0..4),
    ) {
        let selection = select_format(&caps, &preferred, None).unwrap();
        let any_supported = preferred.iter().any(|f| caps.supports(*f));
        prop_assert_eq!(selection.fallback, !any_supported);
        if any_supported {
            let first_supported = preferred.iter().find(|f| caps.supports(**f)).unwrap();
            prop_assert_eq!(selection.format, *first_supported);
        } else {
            prop_assert_eq!(selection.format, caps.formats[0].format);
        }
    }

    /// INVARIANT: With a target, no reported size is strictly closer
    #[test]
    fn closest_size_is_minimal(caps in capabilities(), target in size()) {
        let selection = select_format(&caps, &[], Some(target)).unwrap();
        let best = selection.size.distance_squared(&target);
        for candidate in caps.output_sizes(selection.format).unwrap() {
            prop_assert!(candidate.distance_squared(&target) >= best);
        }
    }

    /// INVARIANT: Without a target, the largest area wins
    #[test]
    fn no_target_picks_max_area(caps in capabilities()) {
        let selection = select_format(&caps, &[], None).unwrap();
        let max = caps
            .output_sizes(selection.format)
            .unwrap()
            .iter()
            .map(|s| s.area())
            .max()
            .unwrap();
        prop_assert_eq!(selection.size.area(), max);
    }

    /// INVARIANT: A retry always pairs the photo with the video resolution,
    /// and the continuous set never includes the photo output
    #[test]
    fn retry_plan_uses_video_size(
        caps in capabilities(),
        video_target in prop::option::of(size()),
        photo_target in prop::option::of(size()),
    ) {
        let request = StreamRequest {
            wants_video: true,
            wants_photo: true,
            target_video_size: video_target,
            target_photo_size: photo_target,
            ..Default::default()
        };
        let plan = plan_outputs(&caps, &request, &NegotiationConfig::default(), Attempt::Retry).unwrap();
        prop_assert_eq!(plan.photo.unwrap().size, plan.video.unwrap().size);

        for descriptor in &plan.descriptors {
            prop_assert_eq!(descriptor.is_repeating, descriptor.purpose != OutputPurpose::Photo);
            prop_assert_eq!(descriptor.is_mirrored, caps.is_mirrored());
        }
    }
}

#[test]
fn fixed_example_matches_expectation() {
    let caps = DeviceCapabilities::new(
        LensFacing::Back,
        vec![FormatSupport::new(
            PixelFormat::Yuv420_888,
            vec![Size::new(640, 480), Size::new(1280, 720), Size::new(1920, 1080)],
        )],
    );
    let selection = select_format(&caps, &[PixelFormat::Yuv420_888], Some(Size::new(1270, 700))).unwrap();
    assert_eq!(selection.size, Size::new(1280, 720));
    assert!(!selection.fallback);
}
