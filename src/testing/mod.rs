//! Testing utilities for crabcamera-session
//!
//! A synthetic camera stack plus sinks and listeners that record what the
//! orchestrator delivered, enabling offline testing without hardware.

pub mod synthetic_camera;
pub mod synthetic_data;

pub use synthetic_camera::{
    HardwareEvent, HardwareLog, OpenBehavior, SessionBehavior, SyntheticCameraProvider,
};
pub use synthetic_data::{
    synthetic_capabilities, synthetic_front_capabilities, synthetic_image, synthetic_webcam_capabilities,
};

use crate::delivery::{Frame, FrameSink};
use crate::errors::CameraError;
use crate::view::ViewListener;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Frame sink that keeps every delivered frame
#[derive(Default)]
pub struct CollectingSink {
    frames: Mutex<Vec<Frame>>,
    delivered: Condvar,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Block until at least `count` frames arrived or `timeout` elapsed
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut frames) = self.frames.lock() else {
            return false;
        };
        while frames.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            frames = match self.delivered.wait_timeout(frames, deadline - now) {
                Ok((guard, _)) => guard,
                Err(_) => return false,
            };
        }
        true
    }
}

impl FrameSink for CollectingSink {
    fn deliver(&self, frame: Frame) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(frame);
        }
        self.delivered.notify_all();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Initialized,
    Error(CameraError),
}

/// View listener that records every callback in order
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn initialized_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ListenerEvent::Initialized))
            .count()
    }

    pub fn errors(&self) -> Vec<CameraError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::Error(error) => Some(error),
                ListenerEvent::Initialized => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn push(&self, event: ListenerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ViewListener for RecordingListener {
    fn on_initialized(&self) {
        self.push(ListenerEvent::Initialized);
    }

    fn on_error(&self, error: &CameraError) {
        self.push(ListenerEvent::Error(error.clone()));
    }
}
