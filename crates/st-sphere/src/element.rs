// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Element types accepted by the resampling operators.
//!
//! [`Label`] covers everything the voting resampler can tally; [`Element`]
//! narrows that to the two floating types the interpolation operators are
//! instantiated for, and carries the atomic accumulator used by parallel
//! scatter passes.

use crate::tensor::{DenseTensor, Tensor};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Runtime tag naming the element type of a [`Tensor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    U8,
}

impl DType {
    fn label(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
        }
    }

    /// Whether interpolation-based operators accept this dtype.
    pub fn is_floating(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values the voting resampler can tally. Equality is `PartialEq` equality.
pub trait Label: Copy + PartialEq + Default + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    /// Wraps a typed tensor into the dtype-tagged sum type.
    fn into_tensor(tensor: DenseTensor<Self>) -> Tensor;

    /// Borrows the typed tensor if `tensor` carries this dtype.
    fn from_tensor(tensor: &Tensor) -> Option<&DenseTensor<Self>>;
}

/// Floating element type with a lock-free accumulator cell.
pub trait Element: Label + Float {
    /// Atomic cell holding the bit pattern of one value.
    type Atomic: Send + Sync;

    fn new_atomic(value: Self) -> Self::Atomic;

    /// Adds `value` into `cell` with a compare-and-swap loop.
    fn atomic_add(cell: &Self::Atomic, value: Self);

    fn atomic_into_inner(cell: Self::Atomic) -> Self;

    /// Converts a literal constant; both supported types represent every
    /// constant used by the kernels.
    #[inline]
    fn lit(value: f64) -> Self {
        <Self as num_traits::NumCast>::from(value).unwrap_or_else(Self::nan)
    }
}

macro_rules! impl_label {
    ($ty:ty, $dtype:ident) => {
        impl Label for $ty {
            const DTYPE: DType = DType::$dtype;

            fn into_tensor(tensor: DenseTensor<Self>) -> Tensor {
                Tensor::$dtype(tensor)
            }

            fn from_tensor(tensor: &Tensor) -> Option<&DenseTensor<Self>> {
                match tensor {
                    Tensor::$dtype(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_label!(f32, F32);
impl_label!(f64, F64);
impl_label!(i32, I32);
impl_label!(i64, I64);
impl_label!(u8, U8);

impl Element for f32 {
    type Atomic = AtomicU32;

    #[inline]
    fn new_atomic(value: Self) -> Self::Atomic {
        AtomicU32::new(value.to_bits())
    }

    #[inline]
    fn atomic_add(cell: &Self::Atomic, value: Self) {
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    fn atomic_into_inner(cell: Self::Atomic) -> Self {
        f32::from_bits(cell.into_inner())
    }
}

impl Element for f64 {
    type Atomic = AtomicU64;

    #[inline]
    fn new_atomic(value: Self) -> Self::Atomic {
        AtomicU64::new(value.to_bits())
    }

    #[inline]
    fn atomic_add(cell: &Self::Atomic, value: Self) {
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    fn atomic_into_inner(cell: Self::Atomic) -> Self {
        f64::from_bits(cell.into_inner())
    }
}
