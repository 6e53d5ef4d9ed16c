//! Lifecycle tests for `CameraView` against the synthetic camera stack.
//!
//! Run with: cargo test --test orchestrator_test

use crabcamera_session::errors::{CameraError, DeviceErrorCode};
use crabcamera_session::invariant_ppt::contract_test;
use crabcamera_session::orientation::Rotation;
use crabcamera_session::permissions::StaticPermission;
use crabcamera_session::session::{Attempt, ConfigurationState};
use crabcamera_session::testing::{
    synthetic_capabilities, CollectingSink, HardwareEvent, OpenBehavior, RecordingListener, SessionBehavior,
    SyntheticCameraProvider,
};
use crabcamera_session::types::{CameraId, OutputPurpose, Size, SurfaceId};
use crabcamera_session::view::{CameraView, FormatProps, PreviewType, TorchMode};
use crabcamera_session::NegotiationConfig;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    provider: SyntheticCameraProvider,
    listener: Arc<RecordingListener>,
    view: CameraView,
}

fn harness_with(provider: SyntheticCameraProvider, granted: bool) -> Harness {
    let listener = Arc::new(RecordingListener::new());
    let view = CameraView::new(
        Arc::new(provider.clone()),
        Arc::new(StaticPermission(granted)),
        Arc::new(CollectingSink::new()),
        listener.clone(),
        NegotiationConfig::default(),
    )
    .unwrap();
    Harness {
        provider,
        listener,
        view,
    }
}

fn harness() -> Harness {
    harness_with(SyntheticCameraProvider::with_default_camera(), true)
}

fn video_and_photo() -> FormatProps {
    FormatProps {
        video_width: 1280,
        video_height: 720,
        photo_width: 4032,
        photo_height: 3024,
    }
}

/// Select camera "0" with video and photo, no preview, and apply it
async fn configure_video_photo(h: &Harness) {
    h.view.set_props(|p| {
        p.camera_id = Some("0".into());
        p.video = Some(true);
        p.photo = Some(true);
        p.preview_type = PreviewType::None;
        p.format = Some(video_and_photo());
    });
    h.view.apply_changes(["cameraId", "video", "photo", "format"]);
    h.view.wait_idle().await;
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_happy_path_reaches_active() {
    let h = harness();
    configure_video_photo(&h).await;

    assert_eq!(h.listener.initialized_count(), 1);
    assert!(h.listener.errors().is_empty());

    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Active);
    assert_eq!(
        status.last_pass,
        vec![
            ConfigurationState::Opening,
            ConfigurationState::Negotiating(Attempt::First),
            ConfigurationState::Building(Attempt::First),
            ConfigurationState::Active,
        ]
    );
    assert_eq!(status.build_attempts, 1);
    assert!(status.session_id.is_some());
    assert_eq!(status.camera_id, Some(CameraId::new("0")));

    let purposes: Vec<OutputPurpose> = status.outputs.iter().map(|o| o.purpose).collect();
    assert_eq!(purposes, vec![OutputPurpose::Video, OutputPurpose::Photo]);
    assert_eq!(status.outputs[0].size(), Some(Size::new(1280, 720)));
    assert_eq!(status.outputs[1].size(), Some(Size::new(4032, 3024)));
    // Photo is single-shot, so only video is in the continuous request
    assert_eq!(status.repeating_outputs, 1);

    h.view.shutdown().await;
}

#[tokio::test]
async fn test_permission_denied_fails_before_open() {
    let h = harness_with(SyntheticCameraProvider::with_default_camera(), false);
    configure_video_photo(&h).await;

    assert_eq!(h.listener.errors(), vec![CameraError::PermissionDenied]);
    assert_eq!(h.listener.initialized_count(), 0);
    assert_eq!(h.view.status().await.state, ConfigurationState::Failed);
    assert!(h.provider.log().events().is_empty());
}

#[tokio::test]
async fn test_no_camera_selected() {
    let h = harness();
    h.view.set_props(|p| p.video = Some(true));
    h.view.apply_changes(["video"]);
    h.view.wait_idle().await;

    assert_eq!(h.listener.errors(), vec![CameraError::NoCameraSelected]);
    assert!(h.provider.log().events().is_empty());
}

#[tokio::test]
async fn test_open_failure_reports_device_code() {
    let h = harness();
    h.provider
        .set_open_behavior("0", OpenBehavior::Fail(DeviceErrorCode::MaxCamerasInUse));
    configure_video_photo(&h).await;

    let errors = h.listener.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0],
        CameraError::CameraOpenFailed {
            identity: CameraId::new("0"),
            reason: DeviceErrorCode::MaxCamerasInUse,
        }
    );
    assert_eq!(errors[0].kind().code(), "device/camera-cannot-be-opened");
}

#[tokio::test]
async fn test_disconnect_while_opening() {
    let h = harness();
    h.provider.set_open_behavior("0", OpenBehavior::Disconnect);
    configure_video_photo(&h).await;

    assert_eq!(
        h.listener.errors(),
        vec![CameraError::CameraDisconnected(CameraId::new("0"))]
    );
    assert_eq!(h.view.status().await.state, ConfigurationState::Failed);
}

#[tokio::test]
async fn test_rejected_combination_retries_with_video_size() {
    let h = harness();
    h.provider
        .set_session_behavior("0", SessionBehavior::RejectMixedResolutions);
    configure_video_photo(&h).await;

    assert_eq!(h.listener.initialized_count(), 1);
    assert!(h.listener.errors().is_empty());

    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Active);
    assert_eq!(status.build_attempts, 2);
    assert!(status.last_pass.contains(&ConfigurationState::ErrorRetry));
    assert!(status
        .last_pass
        .contains(&ConfigurationState::Building(Attempt::Retry)));

    let log = h.provider.log();
    assert_eq!(log.count(|e| matches!(e, HardwareEvent::SessionRejected { .. })), 1);
    let created = log.sessions_created();
    assert_eq!(created.len(), 1);
    let photo = created[0]
        .iter()
        .find(|d| d.purpose == OutputPurpose::Photo)
        .unwrap();
    assert_eq!(photo.size(), Some(Size::new(1280, 720)));
}

#[tokio::test]
async fn test_second_rejection_is_reported_once() {
    let h = harness();
    h.provider.set_session_behavior("0", SessionBehavior::AlwaysReject);
    configure_video_photo(&h).await;

    let errors = h.listener.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], CameraError::ConfigurationRejected(_)));
    assert_eq!(h.listener.initialized_count(), 0);

    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Failed);
    assert_eq!(status.build_attempts, 2);
    assert_eq!(
        h.provider
            .log()
            .count(|e| matches!(e, HardwareEvent::SessionRejected { .. })),
        2
    );
    // Device is not kept open after a failed pass
    assert_eq!(h.provider.open_devices(), 0);
}

#[tokio::test]
async fn test_other_session_errors_are_not_retried() {
    let h = harness();
    h.provider
        .set_session_behavior("0", SessionBehavior::Fail("camera service died".into()));
    configure_video_photo(&h).await;

    assert_eq!(
        h.listener.errors(),
        vec![CameraError::SessionFailed("camera service died".into())]
    );
    assert_eq!(h.view.status().await.build_attempts, 1);
}

#[tokio::test]
async fn test_reconfiguration_closes_previous_session_first() {
    let h = harness();
    configure_video_photo(&h).await;

    h.view.set_props(|p| p.photo = Some(false));
    h.view.apply_changes(["photo"]);
    h.view.wait_idle().await;

    assert_eq!(h.listener.initialized_count(), 2);
    assert_eq!(h.provider.open_sessions(), 1);
    assert_eq!(h.provider.open_devices(), 1);

    let events = h.provider.log().events();
    let first_close = events
        .iter()
        .position(|e| matches!(e, HardwareEvent::SessionClosed { .. }))
        .unwrap();
    let device_close = events
        .iter()
        .position(|e| matches!(e, HardwareEvent::DeviceClosed { .. }))
        .unwrap();
    let second_open = events
        .iter()
        .rposition(|e| matches!(e, HardwareEvent::DeviceOpened { .. }))
        .unwrap();
    let second_request = events
        .iter()
        .rposition(|e| matches!(e, HardwareEvent::RepeatingRequest { .. }))
        .unwrap();

    assert!(first_close < device_close);
    assert!(device_close < second_open);
    assert!(first_close < second_request);

    let status = h.view.status().await;
    assert_eq!(status.outputs.len(), 1);
    assert_eq!(status.outputs[0].purpose, OutputPurpose::Video);
}

#[tokio::test]
async fn test_rapid_changes_are_serialized() {
    let h = harness();
    h.view.set_props(|p| {
        p.camera_id = Some("0".into());
        p.video = Some(true);
        p.preview_type = PreviewType::None;
    });

    for i in 0..5 {
        let fps = 24 + i;
        h.view.set_props(|p| p.fps = Some(fps));
        h.view.apply_changes(["cameraId", "fps"]);
    }
    h.view.wait_idle().await;

    let status = h.view.status().await;
    assert_eq!(status.passes, 5);
    assert_eq!(h.listener.initialized_count(), 5);
    assert_eq!(h.provider.open_sessions(), 1);
    assert_eq!(h.provider.open_devices(), 1);

    // Every session but the last was closed before the next device opened
    let events = h.provider.log().events();
    let mut open_sessions = 0i32;
    for event in &events {
        match event {
            HardwareEvent::SessionCreated { .. } => open_sessions += 1,
            HardwareEvent::SessionClosed { .. } => open_sessions -= 1,
            _ => {}
        }
        assert!(open_sessions <= 1, "two sessions were open at once: {:?}", events);
    }

    contract_test(
        "serialized configuration",
        &[
            "at most one active capture session per view",
            "at most one device open attempt in flight",
            "configuration passes follow the state table",
            "a configuration pass retries at most once",
            "continuous request never targets single-shot outputs",
        ],
    );
}

#[tokio::test]
async fn test_photo_only_session_has_no_continuous_request() {
    let h = harness();
    h.view.set_props(|p| {
        p.camera_id = Some("0".into());
        p.photo = Some(true);
        p.preview_type = PreviewType::None;
    });
    h.view.apply_changes(["cameraId", "photo"]);
    h.view.wait_idle().await;

    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Active);
    assert_eq!(status.repeating_outputs, 0);
    assert_eq!(
        h.provider
            .log()
            .count(|e| matches!(e, HardwareEvent::RepeatingRequest { .. })),
        0
    );
}

#[tokio::test]
async fn test_empty_request_still_activates() {
    let h = harness();
    h.view.set_props(|p| {
        p.camera_id = Some("0".into());
        p.preview_type = PreviewType::None;
    });
    h.view.apply_changes(["cameraId"]);
    h.view.wait_idle().await;

    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Active);
    assert!(status.outputs.is_empty());
    assert_eq!(h.listener.initialized_count(), 1);
}

#[tokio::test]
async fn test_zoom_and_torch_do_not_rebuild() {
    let h = harness();
    configure_video_photo(&h).await;

    h.view.set_props(|p| {
        p.zoom = 20.0;
        p.torch = TorchMode::On;
    });
    h.view.apply_changes(["zoom", "torch"]);
    h.view.wait_idle().await;

    let status = h.view.status().await;
    // Synthetic back camera zooms 1x-8x
    assert_eq!(status.zoom, 8.0);
    assert!(status.torch);

    let log = h.provider.log();
    assert_eq!(log.sessions_created().len(), 1);
    assert_eq!(log.count(|e| matches!(e, HardwareEvent::RepeatingRequest { .. })), 2);
    assert_eq!(h.listener.initialized_count(), 1);
}

#[tokio::test]
async fn test_broken_zoom_range_still_activates() {
    let provider = SyntheticCameraProvider::new()
        .with_camera("0", synthetic_capabilities().with_zoom_range(f32::NAN, 4.0));
    let h = harness_with(provider, true);
    configure_video_photo(&h).await;

    assert_eq!(h.listener.initialized_count(), 1);
    assert!(h.listener.errors().is_empty());
    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Active);
    assert_eq!(status.zoom, 1.0);

    // The lifecycle queue keeps serving commands
    h.view.set_props(|p| p.zoom = 3.0);
    h.view.apply_changes(["zoom"]);
    h.view.wait_idle().await;
    assert_eq!(h.view.status().await.zoom, 3.0);
}

#[tokio::test]
async fn test_orientation_updates_output_rotation() {
    let h = harness();
    configure_video_photo(&h).await;

    h.view.set_props(|p| p.orientation = Some("landscapeLeft".into()));
    h.view.apply_changes(["orientation"]);
    h.view.wait_idle().await;

    assert_eq!(h.view.status().await.output_rotation, Rotation::Rotation270);
    let last_request = h
        .provider
        .log()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            HardwareEvent::RepeatingRequest { request, .. } => Some(request),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last_request.output_rotation, Rotation::Rotation270);
}

#[tokio::test]
async fn test_unrecognized_orientation_keeps_session() {
    let h = harness();
    configure_video_photo(&h).await;

    h.view.set_props(|p| p.orientation = Some("sideways".into()));
    h.view.apply_changes(["orientation"]);
    h.view.wait_idle().await;

    assert_eq!(
        h.listener.errors(),
        vec![CameraError::UnrecognizedOrientationValue("sideways".into())]
    );
    assert_eq!(h.view.status().await.state, ConfigurationState::Active);
}

#[tokio::test]
async fn test_display_rotation_applies_without_orientation() {
    let h = harness();
    configure_video_photo(&h).await;

    h.view.set_display_rotation(Rotation::Rotation90);
    h.view.wait_idle().await;
    assert_eq!(h.view.status().await.output_rotation, Rotation::Rotation90);
    assert_eq!(h.provider.log().sessions_created().len(), 1);
}

#[tokio::test]
async fn test_preview_waits_for_surface() {
    let h = harness();
    h.view.set_props(|p| {
        p.camera_id = Some("0".into());
        p.video = Some(true);
    });
    h.view.apply_changes(["cameraId", "video"]);
    h.view.wait_idle().await;

    let status = h.view.status().await;
    assert_eq!(status.outputs.len(), 1);

    h.view.preview_surface_created(SurfaceId(42));
    h.view.wait_idle().await;

    let status = h.view.status().await;
    assert_eq!(status.preview_surface, Some(SurfaceId(42)));
    let purposes: Vec<OutputPurpose> = status.outputs.iter().map(|o| o.purpose).collect();
    assert_eq!(purposes, vec![OutputPurpose::Video, OutputPurpose::Preview]);
    assert_eq!(status.repeating_outputs, 2);

    h.view.preview_surface_destroyed();
    h.view.wait_idle().await;
    assert_eq!(h.view.status().await.preview_surface, None);
}

#[tokio::test]
async fn test_surface_without_camera_does_not_configure() {
    let h = harness();
    h.view.preview_surface_created(SurfaceId(1));
    h.view.wait_idle().await;

    assert!(h.listener.events().is_empty());
    assert_eq!(h.view.status().await.state, ConfigurationState::Idle);
}

#[tokio::test]
async fn test_device_loss_tears_down_and_reports() {
    let h = harness();
    configure_video_photo(&h).await;

    assert!(h.provider.disconnect("0"));
    let listener = h.listener.clone();
    assert!(wait_until(|| !listener.errors().is_empty()).await);
    h.view.wait_idle().await;

    assert_eq!(
        h.listener.errors(),
        vec![CameraError::CameraDisconnected(CameraId::new("0"))]
    );
    let status = h.view.status().await;
    assert_eq!(status.state, ConfigurationState::Failed);
    assert!(status.session_id.is_none());
    assert_eq!(h.provider.open_sessions(), 0);
    assert_eq!(h.provider.open_devices(), 0);

    // A new change batch recovers
    h.view.apply_changes(["cameraId"]);
    h.view.wait_idle().await;
    assert_eq!(h.view.status().await.state, ConfigurationState::Active);
}

#[tokio::test]
async fn test_device_error_maps_to_open_failed() {
    let h = harness();
    configure_video_photo(&h).await;

    assert!(h.provider.fail_device("0", DeviceErrorCode::ServiceError));
    let listener = h.listener.clone();
    assert!(wait_until(|| !listener.errors().is_empty()).await);

    assert!(matches!(
        h.listener.errors()[0],
        CameraError::CameraOpenFailed {
            reason: DeviceErrorCode::ServiceError,
            ..
        }
    ));
}

#[tokio::test]
async fn test_shutdown_releases_hardware() {
    let h = harness();
    configure_video_photo(&h).await;
    h.view.shutdown().await;

    assert_eq!(h.provider.open_sessions(), 0);
    assert_eq!(h.provider.open_devices(), 0);
    assert_eq!(h.view.status().await.state, ConfigurationState::Idle);
}

#[tokio::test]
async fn test_dropping_view_releases_hardware() {
    let h = harness();
    configure_video_photo(&h).await;

    let provider = h.provider.clone();
    drop(h);
    assert!(wait_until(|| provider.open_devices() == 0).await);
    assert_eq!(provider.open_sessions(), 0);
}
