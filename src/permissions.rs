//! Capture permission gate.
//!
//! The orchestrator only ever asks one question, synchronously, before each
//! open attempt: may we capture? `PermissionGate` is that question; the system
//! probe below is one answer to it.

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
}

/// Boolean capture-permission gate queried before every open attempt
pub trait PermissionGate: Send + Sync {
    fn has_capture_permission(&self) -> bool;
}

/// Fixed answer, for hosts that resolve permission elsewhere
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl PermissionGate for StaticPermission {
    fn has_capture_permission(&self) -> bool {
        self.0
    }
}

/// Gate backed by the operating system probe
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermissions;

impl PermissionGate for SystemPermissions {
    fn has_capture_permission(&self) -> bool {
        let info = check_permission_detailed();
        if info.status != PermissionStatus::Granted {
            log::debug!("Capture permission not granted: {}", info.message);
        }
        info.status == PermissionStatus::Granted
    }
}

/// Check camera permission status for the current platform
pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

/// Check camera permission status with detailed information
pub fn check_permission_detailed() -> PermissionInfo {
    #[cfg(target_os = "linux")]
    {
        check_permission_linux()
    }

    #[cfg(not(target_os = "linux"))]
    {
        PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Permission probe not available on this platform".to_string(),
        }
    }
}

#[cfg(target_os = "linux")]
fn check_permission_linux() -> PermissionInfo {
    use std::path::Path;

    let first_device = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .find(|path| Path::new(path).exists());

    let Some(first_device) = first_device else {
        return PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "No video devices found at /dev/video*".to_string(),
        };
    };

    match std::fs::OpenOptions::new().read(true).open(&first_device) {
        Ok(_) => PermissionInfo {
            status: PermissionStatus::Granted,
            message: format!("Camera device {} is readable", first_device),
        },
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => PermissionInfo {
            status: PermissionStatus::Denied,
            message: format!(
                "Camera device {} exists but is not readable - run: sudo usermod -a -G video $USER",
                first_device
            ),
        },
        Err(e) => PermissionInfo {
            status: PermissionStatus::Restricted,
            message: format!("Cannot access {}: {}", first_device, e),
        },
    }
}
