//! crabcamera-session: capture session negotiation and lifecycle management
//!
//! Drives a camera from "the view's properties changed" to "a capture session
//! is streaming to every enabled consumer": preview, video frames for
//! processing and recording, and still photos.
//!
//! # Features
//! - Pure format negotiation against device-reported capabilities
//! - Serialized configuration passes with a single degraded retry
//! - Bounded image buffers that drop frames instead of stalling the device
//! - Dedicated frame delivery thread, photos consumed on the lifecycle worker
//! - Hardware behind async traits; a synthetic camera stack ships in `testing`
//!
//! # Usage
//! ```rust,ignore
//! use crabcamera_session::testing::{CollectingSink, SyntheticCameraProvider};
//! use crabcamera_session::{CameraView, LoggingListener, NegotiationConfig, StaticPermission};
//! use std::sync::Arc;
//!
//! let view = CameraView::new(
//!     Arc::new(SyntheticCameraProvider::with_default_camera()),
//!     Arc::new(StaticPermission(true)),
//!     Arc::new(CollectingSink::new()),
//!     Arc::new(LoggingListener),
//!     NegotiationConfig::default(),
//! )?;
//! view.set_props(|p| {
//!     p.camera_id = Some("0".into());
//!     p.video = Some(true);
//! });
//! view.apply_changes(["cameraId", "video"]);
//! view.wait_idle().await;
//! ```
pub mod config;
pub mod delivery;
pub mod device;
pub mod errors;
pub mod invariant_ppt;
pub mod negotiation;
pub mod orientation;
pub mod permissions;
pub mod platform;
pub mod session;
pub mod types;
pub mod view;

// Testing utilities - synthetic camera stack for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::{CrabSessionConfig, NegotiationConfig};
pub use delivery::{Frame, FrameSink};
pub use errors::{CameraError, DeviceErrorCode, ErrorKind};
pub use negotiation::{plan_outputs, select_format, FormatSelection, OutputPlan};
pub use orientation::{Orientation, Rotation};
pub use permissions::{PermissionGate, StaticPermission, SystemPermissions};
pub use platform::{CameraDevice, CameraProvider, PlatformSession};
pub use session::{Attempt, ConfigurationState};
pub use types::{
    CameraId, DeviceCapabilities, FormatSupport, Image, LensFacing, OutputDescriptor, OutputPurpose,
    PixelFormat, Size, StreamRequest, SurfaceId,
};
pub use view::{CameraProps, CameraView, LoggingListener, ViewListener, ViewStatus};

/// Initialize logging for the session library
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabcamera_session=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
