// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::element::{DType, Label};
use crate::error::{ResampleError, ResampleResult};
use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a tensor's data is executed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Single-threaded scalar loops.
    Cpu,
    /// Rayon work-stealing pool.
    Parallel,
}

impl Device {
    fn label(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Owned n-dimensional array tagged with the device it resides on.
///
/// The wrapped array may be in any memory order; operators reject tensors
/// that are not in standard row-major layout instead of copying them.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseTensor<T> {
    data: ArrayD<T>,
    device: Device,
}

impl<T: Label> DenseTensor<T> {
    /// Wraps an existing array on the CPU device.
    pub fn from_array(data: ArrayD<T>) -> Self {
        Self {
            data,
            device: Device::Cpu,
        }
    }

    /// Builds a row-major tensor from raw data. `data` must hold exactly the
    /// product of `shape` elements.
    pub fn from_shape_vec(shape: &[usize], data: Vec<T>) -> ResampleResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ResampleError::DataLength {
                expected,
                got: data.len(),
            });
        }
        let array = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|_| {
            ResampleError::DataLength {
                expected,
                got: expected,
            }
        })?;
        Ok(Self::from_array(array))
    }

    /// Tensor of `T::default()` (zero for every numeric type).
    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(shape), T::default()))
    }

    pub(crate) fn zeros_on(shape: &[usize], device: Device) -> Self {
        Self::zeros(shape).to_device(device)
    }

    /// Builds a tensor by evaluating `f` at every multi-index in row-major order.
    pub fn from_fn<F>(shape: &[usize], mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> T,
    {
        let array = ArrayD::from_shape_fn(IxDyn(shape), |index| f(index.slice()));
        Self::from_array(array)
    }

    /// Moves the tensor to `device`. Data is not copied.
    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the data is laid out contiguously in row-major order.
    pub fn is_contiguous(&self) -> bool {
        self.data.is_standard_layout()
    }

    /// Flat row-major view of the data, if contiguous.
    pub fn as_slice(&self) -> Option<&[T]> {
        self.data.as_slice()
    }

    pub(crate) fn as_slice_mut(&mut self) -> Option<&mut [T]> {
        self.data.as_slice_mut()
    }

    pub fn view(&self) -> ArrayViewD<'_, T> {
        self.data.view()
    }

    pub fn array(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn into_array(self) -> ArrayD<T> {
        self.data
    }

    /// Copies the data out in row-major order regardless of memory layout.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().copied().collect()
    }
}

/// Dtype-tagged tensor used at the dynamic operator boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensor {
    F32(DenseTensor<f32>),
    F64(DenseTensor<f64>),
    I32(DenseTensor<i32>),
    I64(DenseTensor<i64>),
    U8(DenseTensor<u8>),
}

macro_rules! each_variant {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Tensor::F32($inner) => $body,
            Tensor::F64($inner) => $body,
            Tensor::I32($inner) => $body,
            Tensor::I64($inner) => $body,
            Tensor::U8($inner) => $body,
        }
    };
}

impl Tensor {
    pub fn dtype(&self) -> DType {
        each_variant!(self, inner => inner.dtype())
    }

    pub fn device(&self) -> Device {
        each_variant!(self, inner => inner.device())
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(self, inner => inner.shape())
    }

    pub fn is_contiguous(&self) -> bool {
        each_variant!(self, inner => inner.is_contiguous())
    }

    /// Moves the tensor to `device`. Data is not copied.
    pub fn to_device(self, device: Device) -> Self {
        match self {
            Tensor::F32(inner) => Tensor::F32(inner.to_device(device)),
            Tensor::F64(inner) => Tensor::F64(inner.to_device(device)),
            Tensor::I32(inner) => Tensor::I32(inner.to_device(device)),
            Tensor::I64(inner) => Tensor::I64(inner.to_device(device)),
            Tensor::U8(inner) => Tensor::U8(inner.to_device(device)),
        }
    }

    /// Borrows the typed tensor when the dtype matches `T`.
    pub fn typed<T: Label>(&self) -> Option<&DenseTensor<T>> {
        T::from_tensor(self)
    }
}

impl<T: Label> From<DenseTensor<T>> for Tensor {
    fn from(tensor: DenseTensor<T>) -> Self {
        T::into_tensor(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_shape_vec_rejects_wrong_length() {
        let err = DenseTensor::<f32>::from_shape_vec(&[2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            ResampleError::DataLength {
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn permuted_arrays_are_not_contiguous() {
        let base = DenseTensor::<f64>::from_fn(&[2, 3], |i| (i[0] * 3 + i[1]) as f64);
        assert!(base.is_contiguous());
        let permuted = DenseTensor::from_array(base.array().clone().reversed_axes());
        assert!(!permuted.is_contiguous());
        assert!(permuted.as_slice().is_none());
        assert_eq!(permuted.to_vec(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn tagged_tensor_reports_dtype_and_device() {
        let tensor: Tensor = DenseTensor::<i64>::zeros(&[4]).to_device(Device::Parallel).into();
        assert_eq!(tensor.dtype(), DType::I64);
        assert_eq!(tensor.device(), Device::Parallel);
        assert_eq!(tensor.shape(), &[4]);
        assert!(tensor.typed::<i64>().is_some());
        assert!(tensor.typed::<f32>().is_none());
        let moved = tensor.to_device(Device::Cpu);
        assert_eq!(moved.device(), Device::Cpu);
    }
}
