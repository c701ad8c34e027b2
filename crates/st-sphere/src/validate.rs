// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Precondition checks shared by the operators. Every check runs before an
//! output is allocated.

use crate::element::Label;
use crate::error::{ResampleError, ResampleResult};
use crate::tensor::{DenseTensor, Device};

/// Borrows the flat row-major data of `tensor`, failing when it is not
/// contiguous.
pub(crate) fn contiguous<'a, T: Label>(
    label: &'static str,
    tensor: &'a DenseTensor<T>,
) -> ResampleResult<&'a [T]> {
    tensor
        .as_slice()
        .ok_or(ResampleError::NonContiguous { label })
}

/// Returns the device shared by every argument. The first argument decides
/// the expected device.
pub(crate) fn colocated(args: &[(&'static str, Device)]) -> ResampleResult<Device> {
    let Some(&(_, expected)) = args.first() else {
        return Err(ResampleError::InvalidValue { label: "arguments" });
    };
    for &(label, got) in &args[1..] {
        if got != expected {
            return Err(ResampleError::DeviceMismatch {
                label,
                expected,
                got,
            });
        }
    }
    Ok(expected)
}

/// Returns the shape as a fixed-size array, failing on a rank mismatch.
pub(crate) fn rank<const N: usize>(
    label: &'static str,
    shape: &[usize],
) -> ResampleResult<[usize; N]> {
    <[usize; N]>::try_from(shape).map_err(|_| ResampleError::RankMismatch {
        label,
        expected: N,
        got: shape.to_vec(),
    })
}

pub(crate) fn expect_shape(
    label: &'static str,
    got: &[usize],
    expected: &[usize],
) -> ResampleResult<()> {
    if got != expected {
        return Err(ResampleError::ShapeMismatch {
            label,
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

pub(crate) fn positive(label: &'static str, value: usize) -> ResampleResult<()> {
    if value == 0 {
        return Err(ResampleError::InvalidValue { label });
    }
    Ok(())
}

/// Number of `T` elements an output of `shape` holds, failing when the
/// element count or its byte size does not fit in `isize`.
pub(crate) fn element_count<T>(label: &'static str, shape: &[usize]) -> ResampleResult<usize> {
    let count = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or(ResampleError::InvalidValue { label })?;
    let bytes = count
        .checked_mul(std::mem::size_of::<T>().max(1))
        .ok_or(ResampleError::InvalidValue { label })?;
    if bytes > isize::MAX as usize {
        return Err(ResampleError::InvalidValue { label });
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colocated_names_the_offending_argument() {
        let err = colocated(&[
            ("image", Device::Parallel),
            ("coord_map", Device::Parallel),
            ("weights", Device::Cpu),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ResampleError::DeviceMismatch {
                label: "weights",
                expected: Device::Parallel,
                got: Device::Cpu,
            }
        );
    }

    #[test]
    fn rank_destructures_matching_shapes() {
        let [b, c, h, w] = rank::<4>("input", &[1, 2, 3, 4]).unwrap();
        assert_eq!((b, c, h, w), (1, 2, 3, 4));
        assert!(matches!(
            rank::<4>("input", &[1, 2, 3]),
            Err(ResampleError::RankMismatch { expected: 4, .. })
        ));
    }

    #[test]
    fn element_count_rejects_overflowing_shapes() {
        assert_eq!(element_count::<f32>("output", &[2, 3, 4]), Ok(24));
        assert_eq!(element_count::<f64>("output", &[5, 0, 7]), Ok(0));
        assert_eq!(
            element_count::<f32>("image_hw", &[1, 1, usize::MAX / 2, 4]),
            Err(ResampleError::InvalidValue { label: "image_hw" })
        );
        // Fits as a count but not as bytes.
        assert_eq!(
            element_count::<f64>("input_hw", &[1, isize::MAX as usize / 4]),
            Err(ResampleError::InvalidValue { label: "input_hw" })
        );
    }
}
