//! Rendering systems built on top of the device boundary

pub mod batching;
