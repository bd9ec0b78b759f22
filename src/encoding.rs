//! Packing of a normalized depth value into four 8-bit color channels.
//!
//! The depth target is an ordinary RGBA8 color attachment, so the light pass
//! spreads each depth value over the four channels and the camera pass folds
//! them back together. Channel `w` carries the most significant byte and `x`
//! the least significant one.

use glam::Vec4;

const BIT_SHIFT: Vec4 = Vec4::new(256.0 * 256.0 * 256.0, 256.0 * 256.0, 256.0, 1.0);
const BIT_MASK: Vec4 = Vec4::new(0.0, 1.0 / 256.0, 1.0 / 256.0, 1.0 / 256.0);
const UNPACK: Vec4 = Vec4::new(1.0 / (256.0 * 256.0 * 256.0), 1.0 / (256.0 * 256.0), 1.0 / 256.0, 1.0);

/// Color stored for depth 1.0 (and used to clear the depth target).
pub const FAR_DEPTH_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Encodes `depth` (clamped to `[0, 1]`) into four channels in `[0, 1)`.
pub fn encode_depth(depth: f32) -> Vec4 {
    let depth = if depth.is_nan() { 0.0 } else { depth.clamp(0.0, 1.0) };
    // fract(1.0) would wrap the far plane back to zero.
    if depth >= 1.0 {
        return FAR_DEPTH_COLOR;
    }
    let scaled = depth * BIT_SHIFT;
    let mut comp = scaled - scaled.floor();
    // Remove the part of each channel already carried by the next finer one.
    comp -= Vec4::new(comp.x, comp.x, comp.y, comp.z) * BIT_MASK;
    comp
}

/// Inverse of [`encode_depth`].
pub fn decode_depth(color: Vec4) -> f32 {
    color.dot(UNPACK)
}

/// Encodes `depth` the way an `Rgba8Unorm` attachment stores it.
pub fn encode_depth_unorm(depth: f32) -> [u8; 4] {
    color_to_unorm(encode_depth(depth))
}

/// Decodes a texel read back from an `Rgba8Unorm` attachment.
pub fn decode_depth_unorm(texel: [u8; 4]) -> f32 {
    decode_depth(unorm_to_color(texel))
}

/// Quantizes a color to 8-bit UNORM channels.
pub fn color_to_unorm(color: Vec4) -> [u8; 4] {
    let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [
        quantize(color.x),
        quantize(color.y),
        quantize(color.z),
        quantize(color.w),
    ]
}

/// Expands 8-bit UNORM channels to floats.
pub fn unorm_to_color(texel: [u8; 4]) -> Vec4 {
    Vec4::new(
        texel[0] as f32,
        texel[1] as f32,
        texel[2] as f32,
        texel[3] as f32,
    ) / 255.0
}
