//! Image Compressor Library
//!
//! An image compressor panel: select an image, pick a quality, compress it and
//! preview or download the result. Compression sits behind the
//! [`CompressionService`] trait; [`ImageProcessor`] is the built-in implementation.

pub mod blob_store;
pub mod config;
pub mod image_processor;
pub mod panel;
pub mod routes;
pub mod service;
pub mod types;

pub use blob_store::{BlobStore, DisplayHandle};
pub use config::ServerConfig;
pub use image_processor::ImageProcessor;
pub use panel::{CompressorPanel, PanelState, PanelView};
pub use service::{CompressionService, ProgressReporter};
pub use types::*;
