//! Shared tidemark data model.
//!
//! Streams, watermarks, raw source events, canonical warehouse rows and the
//! error taxonomy. This crate does no I/O so every other crate in the
//! workspace can depend on it.

pub mod errors;
pub mod event;
pub mod row;
pub mod stream;
pub mod watermark;
