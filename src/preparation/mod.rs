//! Image preparation module - validation, data URLs, and downscaling

pub mod data_url;
pub mod prepare;

pub use prepare::{
    prepare, prepare_file, prepare_in_background, read_raw_image, target_dimensions,
    validate_file_name, PrepareOptions, PreparedImage, RawImage,
};
