// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Dtype-tagged operator surface.
//!
//! Each entry point checks the dtype tag of its leading argument once,
//! requires every paired map or gradient to carry the same tag, and runs the
//! generic algorithm for that element type. The backend follows the device
//! of the arguments.

use std::borrow::Cow;

use crate::element::{DType, Label};
use crate::error::{ResampleError, ResampleResult};
use crate::exec::Backend;
use crate::interp::Interpolation;
use crate::observability;
use crate::tensor::{DenseTensor, Tensor};
use crate::{pool, uv, vote};
use tracing::{debug, debug_span};

/// Runs `$body` with `$inner` bound to the typed `f32`/`f64` tensor, failing
/// for every other dtype.
macro_rules! float_dispatch {
    ($op:expr, $lead:expr, $inner:ident => $body:expr) => {
        match $lead {
            Tensor::F32($inner) => Tensor::from($body),
            Tensor::F64($inner) => Tensor::from($body),
            other => {
                return Err(ResampleError::UnsupportedDType {
                    op: $op,
                    dtype: other.dtype(),
                })
            }
        }
    };
}

/// Borrows `tensor` as the element type of the data it pairs with.
fn paired<'a, T: Label>(
    label: &'static str,
    tensor: &'a Tensor,
) -> ResampleResult<&'a DenseTensor<T>> {
    tensor.typed::<T>().ok_or(ResampleError::DTypeMismatch {
        label,
        expected: T::DTYPE,
        got: tensor.dtype(),
    })
}

/// Voting maps may be `i64` or `i32`. An `i32` map is widened into a
/// temporary `i64` copy that lives for the duration of the call.
fn voting_indices(sample_map: &Tensor) -> ResampleResult<Cow<'_, DenseTensor<i64>>> {
    match sample_map {
        Tensor::I64(map) => Ok(Cow::Borrowed(map)),
        Tensor::I32(map) => {
            if !map.is_contiguous() {
                return Err(ResampleError::NonContiguous {
                    label: "sample_map",
                });
            }
            let widened = DenseTensor::from_array(map.array().mapv(i64::from));
            Ok(Cow::Owned(widened.to_device(map.device())))
        }
        other => Err(ResampleError::DTypeMismatch {
            label: "sample_map",
            expected: DType::I64,
            got: other.dtype(),
        }),
    }
}

fn finish(op: &'static str, input: &Tensor, output: Tensor) -> ResampleResult<Tensor> {
    let backend = Backend::for_device(output.device());
    debug!(
        op,
        %backend,
        input_shape = ?input.shape(),
        output_shape = ?output.shape(),
        "resample op complete"
    );
    observability::emit_resample_op(op, backend, input.shape(), output.shape());
    Ok(output)
}

/// Equirectangular image `[B, C, H, W]` to `[B, C, N, th, tw]` tangent
/// textures. See [`uv::forward`].
pub fn resample_uv_forward(
    image: &Tensor,
    coord_map: &Tensor,
    num_textures: usize,
    texture_height: usize,
    texture_width: usize,
    policy: Interpolation,
) -> ResampleResult<Tensor> {
    const OP: &str = "resample_uv_forward";
    let _span = debug_span!(
        "st_sphere.op",
        op = OP,
        device = %image.device(),
        dtype = %image.dtype(),
        %policy,
    )
    .entered();
    let output = float_dispatch!(OP, image, image => uv::forward(
        image,
        paired("coord_map", coord_map)?,
        num_textures,
        texture_height,
        texture_width,
        policy,
    )?);
    finish(OP, image, output)
}

/// Adjoint of [`resample_uv_forward`] for an image of size `image_hw`.
pub fn resample_uv_backward(
    grad_out: &Tensor,
    coord_map: &Tensor,
    image_hw: (usize, usize),
    policy: Interpolation,
) -> ResampleResult<Tensor> {
    const OP: &str = "resample_uv_backward";
    let _span = debug_span!(
        "st_sphere.op",
        op = OP,
        device = %grad_out.device(),
        dtype = %grad_out.dtype(),
        %policy,
    )
    .entered();
    let output = float_dispatch!(OP, grad_out, grad => uv::backward(
        grad,
        paired("coord_map", coord_map)?,
        image_hw,
        policy,
    )?);
    finish(OP, grad_out, output)
}

/// Weighted pooling of `input[B, C, H, W]` over `K`-tap kernels. See
/// [`pool::forward`].
pub fn weighted_pool_forward(
    input: &Tensor,
    sample_map: &Tensor,
    weight_map: &Tensor,
    kernel_size: usize,
    policy: Interpolation,
) -> ResampleResult<Tensor> {
    const OP: &str = "weighted_pool_forward";
    let _span = debug_span!(
        "st_sphere.op",
        op = OP,
        device = %input.device(),
        dtype = %input.dtype(),
        %policy,
    )
    .entered();
    let output = float_dispatch!(OP, input, input => pool::forward(
        input,
        paired("sample_map", sample_map)?,
        paired("weight_map", weight_map)?,
        kernel_size,
        policy,
    )?);
    finish(OP, input, output)
}

/// Adjoint of [`weighted_pool_forward`] for an input of size `input_hw`.
pub fn weighted_pool_backward(
    grad_out: &Tensor,
    sample_map: &Tensor,
    weight_map: &Tensor,
    input_hw: (usize, usize),
    kernel_size: usize,
    policy: Interpolation,
) -> ResampleResult<Tensor> {
    const OP: &str = "weighted_pool_backward";
    let _span = debug_span!(
        "st_sphere.op",
        op = OP,
        device = %grad_out.device(),
        dtype = %grad_out.dtype(),
        %policy,
    )
    .entered();
    let output = float_dispatch!(OP, grad_out, grad => pool::backward(
        grad,
        paired("sample_map", sample_map)?,
        paired("weight_map", weight_map)?,
        input_hw,
        kernel_size,
        policy,
    )?);
    finish(OP, grad_out, output)
}

/// Plurality-vote resampling of any supported dtype. See [`vote::resample`].
pub fn voting_resample(
    input: &Tensor,
    sample_map: &Tensor,
    out_hw: (usize, usize),
    num_candidates: usize,
) -> ResampleResult<Tensor> {
    const OP: &str = "voting_resample";
    let _span = debug_span!(
        "st_sphere.op",
        op = OP,
        device = %input.device(),
        dtype = %input.dtype(),
    )
    .entered();
    let indices = voting_indices(sample_map)?;
    let output = match input {
        Tensor::F32(input) => vote::resample(input, &indices, out_hw, num_candidates)?.into(),
        Tensor::F64(input) => vote::resample(input, &indices, out_hw, num_candidates)?.into(),
        Tensor::I32(input) => vote::resample(input, &indices, out_hw, num_candidates)?.into(),
        Tensor::I64(input) => vote::resample(input, &indices, out_hw, num_candidates)?.into(),
        Tensor::U8(input) => vote::resample(input, &indices, out_hw, num_candidates)?.into(),
    };
    finish(OP, input, output)
}
