//! CvdScope Library
//!
//! Real-time cumulative volume delta (CVD) analytics over a streaming
//! trade feed: candle resampling, efficiency-ratio signal classification,
//! hysteresis-based cumulative segmentation, and snapshot publishing.

pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod feed;
pub mod persistence;
pub mod server;
pub mod snapshot;
pub mod types;
