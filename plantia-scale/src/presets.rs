// SPDX-License-Identifier: MIT
//! # Scale Plans and Width Bounds
//!
//! The client never lets an image wider than a fixed bound reach the
//! network. Live camera frames are bounded at 640px, file uploads at 500px
//! (phone photos are large and decoding them is what exhausts memory on
//! small devices).
//!
//! A [`ScalePlan`] records the input size and the computed output size.
//! All computations use floating point and round to the nearest integer,
//! clamped to a minimum of 1px.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// Width bound applied to frames grabbed from a live camera stream.
pub const CAPTURE_MAX_WIDTH: u32 = 640;

/// Width bound applied to images decoded from a picked file.
pub const UPLOAD_MAX_WIDTH: u32 = 500;

/// Complete scaling plan computed from the input size and a width bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Width bound the plan was built for
    pub max_width: u32,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the output has the same dimensions as the input.
    pub fn is_identity(&self) -> bool {
        self.input == self.out
    }

    /// Byte length of a tightly packed RGBA8 output buffer.
    pub fn out_len(&self) -> usize {
        (self.out.w as usize) * (self.out.h as usize) * 4
    }

    /// Byte length of a tightly packed RGBA8 input buffer.
    pub fn input_len(&self) -> usize {
        (self.input.w as usize) * (self.input.h as usize) * 4
    }
}

/// Compute the plan for clamping `input` to `max_width`.
///
/// If the input is wider than the bound, the output width equals the bound
/// and the height is scaled by the same ratio. Narrower inputs are left
/// unchanged.
pub fn plan_for_width(input: Size, max_width: u32) -> ScalePlan {
    let (w, h) = fit_width(input, max_width);
    ScalePlan {
        input,
        max_width,
        out: Size { w, h },
    }
}

fn fit_width(input: Size, max_width: u32) -> (u32, u32) {
    if input.w == 0 || input.h == 0 {
        return (input.w.max(1), input.h.max(1));
    }
    if input.w <= max_width {
        return (input.w, input.h);
    }
    let ratio = f64::from(max_width) / f64::from(input.w);
    let h = (f64::from(input.h) * ratio).round() as u32;
    (max_width.max(1), h.max(1))
}
