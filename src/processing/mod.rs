//! # Processing Module
//!
//! Decode, draw (downscale) and export steps between an image source and
//! the prediction transport.

pub mod normalize;

pub use normalize::{
    DecodedBitmap, ImageOrigin, JpegPayload, NormalizedImage, Surface, decode_bitmap,
    decode_bitmap_blocking, encode_jpeg,
};
