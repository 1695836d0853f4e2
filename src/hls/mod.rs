//! HTTP Live Streaming: playlist parsing and the segment worker

pub mod playlist;
pub(crate) mod worker;
