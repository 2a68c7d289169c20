//! Image generation pipeline
//!
//! Provides:
//! - Prompt-to-image calls against the inference API (with a deadline)
//! - Upload of generated images to the file-transfer server

mod gen;
mod upload;

pub use gen::{image_file_name, ImageClient, ImageError};
pub use upload::{FtpUploader, ImageUploader, UploadError};
