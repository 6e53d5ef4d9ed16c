//! Frame delivery.
//!
//! Video images are handed to the host's `FrameSink` on a dedicated serial
//! thread so frame work never runs on the lifecycle worker. Photo images go
//! back to the lifecycle worker through a `PhotoDispatcher`.

use crate::errors::CameraError;
use crate::orientation::Rotation;
use crate::session::ImageReader;
use crate::types::Image;
use crossbeam_channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// Name of the frame delivery thread
pub const FRAME_QUEUE_NAME: &str = "crabcamera-frame-queue";

/// A video frame as seen by the host
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Image,
    pub timestamp_millis: i64,
    pub rotation: Rotation,
    pub is_mirrored: bool,
}

/// Receives video frames on the frame delivery thread
pub trait FrameSink: Send + Sync {
    fn deliver(&self, frame: Frame);
}

/// Per-session values frames are tagged with, captured when the session is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSnapshot {
    pub rotation: Rotation,
    pub is_mirrored: bool,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single worker thread that runs jobs in submission order
pub struct SerialQueue {
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl SerialQueue {
    pub fn new(name: &str) -> Result<Self, CameraError> {
        let (tx, rx) = unbounded::<Job>();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                for job in rx {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Job on {} panicked, continuing with the next one", thread_name);
                    }
                }
                log::debug!("{} stopped", thread_name);
            })
            .map_err(|e| CameraError::SessionFailed(format!("Failed to start {}: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job; returns false once the queue has shut down
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Moves available video images from a reader to the sink on the frame queue
#[derive(Clone)]
pub struct FrameDispatcher {
    queue: Arc<SerialQueue>,
    sink: Arc<dyn FrameSink>,
}

impl FrameDispatcher {
    pub fn new(queue: Arc<SerialQueue>, sink: Arc<dyn FrameSink>) -> Self {
        Self { queue, sink }
    }

    /// Called from a reader's on-image-available listener
    pub fn image_available(&self, reader: Weak<ImageReader>, snapshot: FrameSnapshot) {
        let sink = Arc::clone(&self.sink);
        let queued = self.queue.execute(move || {
            let image = reader.upgrade().and_then(|reader| reader.acquire_next_image());
            match image {
                Some(image) => sink.deliver(Frame {
                    image,
                    timestamp_millis: chrono::Utc::now().timestamp_millis(),
                    rotation: snapshot.rotation,
                    is_mirrored: snapshot.is_mirrored,
                }),
                None => log::warn!("Failed to get new Image from ImageReader, dropping a Frame..."),
            }
        });

        if !queued {
            log::warn!("{} has shut down, dropping a Frame...", self.queue.name());
        }
    }
}

type PhotoCallback = Arc<dyn Fn(Weak<ImageReader>) + Send + Sync>;

/// Forwards photo availability to whoever consumes photos
#[derive(Clone)]
pub struct PhotoDispatcher {
    notify: PhotoCallback,
}

impl PhotoDispatcher {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(Weak<ImageReader>) + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
        }
    }

    pub fn image_available(&self, reader: Weak<ImageReader>) {
        (self.notify)(reader);
    }
}

/// Acquire the newest photo from a reader and release it.
///
/// Returns the consumed image so callers can log or inspect it.
pub fn consume_photo(reader: &Weak<ImageReader>) -> Option<Image> {
    let Some(reader) = reader.upgrade() else {
        log::debug!("Photo reader already released, nothing to consume");
        return None;
    };

    match reader.acquire_latest_image() {
        Some(image) => {
            log::info!(
                "Photo captured! {}x{} ({}, {} bytes)",
                image.width,
                image.height,
                image.format,
                image.data.len()
            );
            Some(image)
        }
        None => {
            log::warn!("Photo reader signalled an image but none was available");
            None
        }
    }
}
