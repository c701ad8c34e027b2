// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

// crates/st-sphere/src/lib.rs
//! Coordinate-indirection resampling for spherical images.
//!
//! Every operator reads its source through a precomputed map: UV tangent
//! texture extraction ([`uv`]), weighted pooling over irregular kernels
//! ([`pool`]) and plurality voting for labels ([`vote`]). The interpolating
//! operators come with exact adjoints. Work runs sequentially or on the rayon
//! pool depending on the [`Device`] the arguments live on.

pub mod element;
pub mod error;
pub mod exec;
pub mod interp;
pub mod observability;
pub mod ops;
pub mod pool;
pub mod telemetry;
pub mod tensor;
pub mod uv;
mod validate;
pub mod vote;

pub use element::{DType, Element, Label};
pub use error::{ResampleError, ResampleResult};
pub use exec::Backend;
pub use interp::Interpolation;
pub use ops::{
    resample_uv_backward, resample_uv_forward, voting_resample, weighted_pool_backward,
    weighted_pool_forward,
};
pub use tensor::{DenseTensor, Device, Tensor};
