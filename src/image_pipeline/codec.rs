//! Raw <-> tensor codec
//!
//! Forward: black-level subtraction, exposure gain, clamp and gamma encode into a
//! `[H/2, W/2, 4]` tensor. Inverse: clamp, gamma decode, rescale and scatter back into the
//! Bayer mosaic.

mod raw_tensor_codec;
pub mod types;


pub use raw_tensor_codec::RawTensorCodec;
pub use types::{CHANNELS, CodecConfig, NormalizedTensor};
