//! Camera properties set by the view layer and the change classification
//! that decides whether a batch needs a new capture session.

use crate::types::{Size, StreamRequest, SurfaceId};
use serde::{Deserialize, Serialize};

/// Requested video and photo resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatProps {
    pub video_width: u32,
    pub video_height: u32,
    pub photo_width: u32,
    pub photo_height: u32,
}

impl FormatProps {
    pub fn video_size(&self) -> Size {
        Size::new(self.video_width, self.video_height)
    }

    pub fn photo_size(&self) -> Size {
        Size::new(self.photo_width, self.photo_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewType {
    #[default]
    Native,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorchMode {
    #[default]
    Off,
    On,
}

/// Mutable property bag owned by the view.
///
/// The lifecycle worker never reads this directly; every command carries a
/// clone taken when the change batch was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraProps {
    pub camera_id: Option<String>,
    pub format: Option<FormatProps>,
    pub fps: Option<u32>,
    pub hdr: Option<bool>,
    pub low_light_boost: Option<bool>,
    pub photo: Option<bool>,
    pub video: Option<bool>,
    pub audio: Option<bool>,
    pub enable_frame_processor: bool,
    pub preview_type: PreviewType,
    pub is_active: bool,
    pub torch: TorchMode,
    pub zoom: f32,
    pub orientation: Option<String>,
}

impl Default for CameraProps {
    fn default() -> Self {
        Self {
            camera_id: None,
            format: None,
            fps: None,
            hdr: None,
            low_light_boost: None,
            photo: None,
            video: None,
            audio: None,
            enable_frame_processor: false,
            preview_type: PreviewType::Native,
            is_active: false,
            torch: TorchMode::Off,
            zoom: 1.0,
            orientation: None,
        }
    }
}

impl CameraProps {
    /// Snapshot the use-cases a configuration pass should build
    pub fn stream_request(&self, preview_surface: Option<SurfaceId>) -> StreamRequest {
        StreamRequest {
            wants_video: self.video == Some(true),
            wants_photo: self.photo == Some(true),
            wants_frame_processing: self.enable_frame_processor,
            wants_preview: self.preview_type == PreviewType::Native,
            target_video_size: self.format.map(|f| f.video_size()),
            target_photo_size: self.format.map(|f| f.photo_size()),
            preview_surface,
        }
    }
}

/// Property names that can only take effect by building a new session
pub const SESSION_PROPS: [&str; 8] = [
    "cameraId",
    "format",
    "fps",
    "hdr",
    "lowLightBoost",
    "photo",
    "video",
    "enableFrameProcessor",
];

/// What a batch of changed property names requires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangePlan {
    pub reconfigure_session: bool,
    pub update_zoom: bool,
    pub update_torch: bool,
    pub update_orientation: bool,
}

impl ChangePlan {
    pub fn classify<S: AsRef<str>>(changed: &[S]) -> Self {
        let mut plan = ChangePlan::default();
        for name in changed {
            match name.as_ref() {
                "zoom" => plan.update_zoom = true,
                "torch" => plan.update_torch = true,
                "orientation" => plan.update_orientation = true,
                other if SESSION_PROPS.contains(&other) => plan.reconfigure_session = true,
                other => log::debug!("Property {} does not affect the capture session", other),
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        *self == ChangePlan::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_props_trigger_reconfiguration() {
        for name in SESSION_PROPS {
            assert!(ChangePlan::classify(&[name]).reconfigure_session, "{}", name);
        }
    }

    #[test]
    fn test_controls_do_not_rebuild() {
        let plan = ChangePlan::classify(&["zoom", "torch", "orientation"]);
        assert!(!plan.reconfigure_session);
        assert!(plan.update_zoom && plan.update_torch && plan.update_orientation);
    }

    #[test]
    fn test_unrelated_props_are_ignored() {
        assert!(ChangePlan::classify(&["isActive", "audio"]).is_empty());
    }

    #[test]
    fn test_stream_request_snapshot() {
        let props = CameraProps {
            camera_id: Some("0".into()),
            video: Some(true),
            photo: Some(false),
            enable_frame_processor: true,
            format: Some(FormatProps {
                video_width: 1280,
                video_height: 720,
                photo_width: 4032,
                photo_height: 3024,
            }),
            ..Default::default()
        };
        let request = props.stream_request(Some(SurfaceId(3)));
        assert!(request.wants_video);
        assert!(!request.wants_photo);
        assert!(request.wants_frame_processing);
        assert!(request.wants_preview);
        assert_eq!(request.target_video_size, Some(Size::new(1280, 720)));
        assert_eq!(request.target_photo_size, Some(Size::new(4032, 3024)));
        assert_eq!(request.preview_surface, Some(SurfaceId(3)));
    }

    #[test]
    fn test_preview_type_none_disables_preview() {
        let props = CameraProps {
            preview_type: PreviewType::None,
            ..Default::default()
        };
        assert!(!props.stream_request(Some(SurfaceId(1))).wants_preview);
    }
}
