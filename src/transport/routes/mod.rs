pub mod misc;
pub mod stream;
