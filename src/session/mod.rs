//! Capture session building blocks: the configuration state machine, image
//! readers and the session builder.

pub mod builder;
pub mod image_reader;
pub mod state;

pub use builder::{ActiveSession, SessionBuilder, SessionControls};
pub use image_reader::{ImageReader, ImageWriteError, ImageWriter};
pub use state::{Attempt, ConfigurationState, PassEvent};
