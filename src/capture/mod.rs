pub mod capture_source;
pub mod device_source;

pub use capture_source::{CaptureSource, MediaStream};
pub use device_source::DeviceCaptureSource;
