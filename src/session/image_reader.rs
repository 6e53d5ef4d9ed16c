//! Image consumer bound to one output of a capture session.
//!
//! The platform writes through an `ImageWriter`; the session side owns the
//! `ImageReader`. A reader holds at most `max_images` undelivered images and
//! a writer drops frames rather than blocking when every buffer is in use.

use crate::types::{Image, PixelFormat, Size};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

type AvailableListener = Arc<dyn Fn() + Send + Sync>;

pub struct ImageReader {
    size: Size,
    format: PixelFormat,
    max_images: usize,
    tx: Sender<Image>,
    rx: Receiver<Image>,
    on_available: RwLock<Option<AvailableListener>>,
    closed: AtomicBool,
}

impl ImageReader {
    pub fn new(size: Size, format: PixelFormat, max_images: usize) -> Arc<Self> {
        let (tx, rx) = bounded(max_images.max(1));
        Arc::new(Self {
            size,
            format,
            max_images: max_images.max(1),
            tx,
            rx,
            on_available: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    /// Images waiting to be acquired
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Invoked once per image accepted from the writer
    pub fn set_on_image_available<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.on_available.write() {
            *slot = Some(Arc::new(listener));
        }
    }

    /// Producer handle for the platform; it does not keep the reader alive
    pub fn writer(self: &Arc<Self>) -> ImageWriter {
        ImageWriter {
            reader: Arc::downgrade(self),
        }
    }

    pub fn acquire_next_image(&self) -> Option<Image> {
        if self.is_closed() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Acquire the newest image, discarding any older ones
    pub fn acquire_latest_image(&self) -> Option<Image> {
        let mut latest = None;
        while let Some(image) = self.acquire_next_image() {
            latest = Some(image);
        }
        latest
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release every pending image and stop accepting new ones
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        while self.rx.try_recv().is_ok() {}
        if let Ok(mut slot) = self.on_available.write() {
            *slot = None;
        }
    }

    fn notify(&self) {
        let listener = self
            .on_available
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(Arc::clone));
        if let Some(listener) = listener {
            listener();
        }
    }
}

impl std::fmt::Debug for ImageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageReader")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("max_images", &self.max_images)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ImageWriteError {
    #[error("all image buffers are in use")]
    BufferFull,
    #[error("image reader has been closed")]
    Closed,
}

/// Producer side of an `ImageReader`
#[derive(Debug, Clone)]
pub struct ImageWriter {
    reader: Weak<ImageReader>,
}

impl ImageWriter {
    pub fn queue_image(&self, image: Image) -> Result<(), ImageWriteError> {
        let reader = self.reader.upgrade().ok_or(ImageWriteError::Closed)?;
        if reader.is_closed() {
            return Err(ImageWriteError::Closed);
        }

        match reader.tx.try_send(image) {
            Ok(()) => {
                reader.notify();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(ImageWriteError::BufferFull),
            Err(TrySendError::Disconnected(_)) => Err(ImageWriteError::Closed),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.reader
            .upgrade()
            .map_or(false, |reader| !reader.is_closed())
    }
}
