//! Image generation and gallery module
//!
//! Provides:
//! - Append-only image record storage
//! - Prompt-to-image generation pipeline
//! - Gallery read path
//! - Payload decoding for raw image serving

mod gallery;
mod gen;
mod payload;
mod store;


pub use gallery::GalleryService;
pub use gen::{GenerateError, GenerationService};
pub use payload::{decode_payload, DecodedImage, PayloadError};
pub use store::{bounded, ImageRecord, ImageStore, SqliteImageStore, StoreError};
