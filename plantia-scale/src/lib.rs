// SPDX-License-Identifier: MIT
//! # plantia-scale: Width-Bounded Downscaling for Classifier Input
//!
//! This crate computes and executes the resize step that every image goes
//! through before it is submitted to the prediction endpoint. Images are
//! clamped to a maximum *width*; the height follows the same ratio, so the
//! aspect ratio of the source is preserved.
//!
//! ## Key Components
//!
//! - [`presets`]: Scale plan computation (`plan_for_width`) and the two
//!   fixed bounds used by the client (live capture and file upload)
//! - [`cpu`]: CPU scaling of tightly packed RGBA8 rasters using
//!   fast_image_resize (SIMD accelerated where available)
//!
//! ## Usage Example
//!
//! ```rust
//! use plantia_scale::cpu::scale_rgba_cpu;
//! use plantia_scale::presets::{plan_for_width, Size};
//!
//! let input = Size { w: 1280, h: 960 };
//! let plan = plan_for_width(input, 640);
//! assert_eq!((plan.out.w, plan.out.h), (640, 480));
//!
//! let src = vec![0u8; (input.w * input.h * 4) as usize];
//! let mut dst = vec![0u8; plan.out_len()];
//! let mut resizer = fast_image_resize::Resizer::new();
//! scale_rgba_cpu(&mut resizer, &src, &plan, &mut dst).unwrap();
//! ```
//!
//! No upscaling is ever performed: images already within the bound keep
//! their original dimensions.

pub mod cpu;
pub mod presets;
