//! Feed framing and viewer wire frames.

pub mod framer;
pub mod frames;

pub use framer::{Frame, StreamFramer};
pub use frames::EventFrame;
