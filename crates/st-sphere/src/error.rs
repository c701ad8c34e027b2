// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::element::DType;
use crate::tensor::Device;
use thiserror::Error;

/// Result alias used by every resampling operator.
pub type ResampleResult<T> = Result<T, ResampleError>;

/// Precondition failures raised before an operator touches any data.
///
/// Out-of-range map entries are not errors: they are zero contributions.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ResampleError {
    /// An array argument is not stored in standard row-major order.
    #[error("{label} must be contiguous in row-major order")]
    NonContiguous { label: &'static str },
    /// Array arguments of one call live on different devices.
    #[error("{label} resides on {got} but the call runs on {expected}")]
    DeviceMismatch {
        label: &'static str,
        expected: Device,
        got: Device,
    },
    /// An array argument has the wrong number of dimensions.
    #[error("{label} must have rank {expected}, got shape {got:?}")]
    RankMismatch {
        label: &'static str,
        expected: usize,
        got: Vec<usize>,
    },
    /// An array argument disagrees with the shape implied by its peers.
    #[error("{label} expected shape {expected:?}, got {got:?}")]
    ShapeMismatch {
        label: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// The operator has no implementation for this element type.
    #[error("{op} does not support dtype {dtype}")]
    UnsupportedDType { op: &'static str, dtype: DType },
    /// A map or gradient does not share the dtype of the data it pairs with.
    #[error("{label} must have dtype {expected}, got {got}")]
    DTypeMismatch {
        label: &'static str,
        expected: DType,
        got: DType,
    },
    /// A scalar argument is out of its valid domain.
    #[error("invalid value for {label}")]
    InvalidValue { label: &'static str },
    /// Raw data handed to a constructor does not fill the requested shape.
    #[error("data length mismatch: expected {expected}, got {got}")]
    DataLength { expected: usize, got: usize },
    /// The execution backend could not be brought up.
    #[error("{backend} backend failure: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },
}
