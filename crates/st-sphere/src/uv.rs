// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Equirectangular image ↔ tangent-plane texture resampling.
//!
//! The coordinate map `[N, th, tw, 2]` stores, for every texel of every one of
//! the `N` textures, the `(x, y)` position in the equirectangular image that
//! the texel samples. Forward gathers `[B, C, H, W] → [B, C, N, th, tw]`;
//! backward scatters the texture gradient into an `[B, C, H, W]` gradient with
//! the same taps.

use crate::element::Element;
use crate::error::{ResampleError, ResampleResult};
use crate::exec::{self, Backend};
use crate::interp::{self, Interpolation};
use crate::tensor::DenseTensor;
use crate::validate;
use tracing::trace;

/// Texture layout implied by a coordinate map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureLayout {
    pub num_textures: usize,
    pub texture_height: usize,
    pub texture_width: usize,
}

impl TextureLayout {
    pub fn texels(&self) -> usize {
        self.num_textures * self.texture_height * self.texture_width
    }

    fn of_map<T: Element>(coord_map: &DenseTensor<T>) -> ResampleResult<Self> {
        let [num_textures, texture_height, texture_width, _] =
            validate::rank::<4>("coord_map", coord_map.shape())?;
        validate::expect_shape(
            "coord_map",
            coord_map.shape(),
            &[num_textures, texture_height, texture_width, 2],
        )?;
        Ok(Self {
            num_textures,
            texture_height,
            texture_width,
        })
    }
}

/// Samples `image[B, C, H, W]` into `[B, C, N, th, tw]` tangent textures.
///
/// `num_textures`, `texture_height` and `texture_width` must agree with the
/// leading dimensions of `coord_map`.
pub fn forward<T: Element>(
    image: &DenseTensor<T>,
    coord_map: &DenseTensor<T>,
    num_textures: usize,
    texture_height: usize,
    texture_width: usize,
    policy: Interpolation,
) -> ResampleResult<DenseTensor<T>> {
    let device = validate::colocated(&[
        ("image", image.device()),
        ("coord_map", coord_map.device()),
    ])?;
    let source = validate::contiguous("image", image)?;
    let coords = validate::contiguous("coord_map", coord_map)?;
    let [batch, channels, height, width] = validate::rank::<4>("image", image.shape())?;
    validate::positive("num_textures", num_textures)?;
    validate::positive("texture_height", texture_height)?;
    validate::positive("texture_width", texture_width)?;
    validate::expect_shape(
        "coord_map",
        coord_map.shape(),
        &[num_textures, texture_height, texture_width, 2],
    )?;

    let layout = TextureLayout {
        num_textures,
        texture_height,
        texture_width,
    };
    let out_shape = [batch, channels, num_textures, texture_height, texture_width];
    validate::element_count::<T>("output", &out_shape)?;

    let texels = layout.texels();
    let src_plane = height * width;
    let backend = Backend::for_device(device);
    trace!(%backend, batch, channels, texels, "uv forward");

    let mut output = DenseTensor::zeros_on(&out_shape, device);
    let out = output
        .as_slice_mut()
        .ok_or(ResampleError::NonContiguous { label: "output" })?;
    exec::gather(backend, out, |index| {
        let plane = index / texels;
        let texel = index % texels;
        let src = &source[plane * src_plane..(plane + 1) * src_plane];
        interp::sample(
            src,
            height,
            width,
            coords[2 * texel],
            coords[2 * texel + 1],
            policy,
        )
    })?;
    Ok(output)
}

/// Adjoint of [`forward`]: scatters `grad_out[B, C, N, th, tw]` into a
/// zero-initialised `[B, C, H, W]` gradient, where `image_hw = (H, W)` is the
/// size of the image the forward pass sampled.
pub fn backward<T: Element>(
    grad_out: &DenseTensor<T>,
    coord_map: &DenseTensor<T>,
    image_hw: (usize, usize),
    policy: Interpolation,
) -> ResampleResult<DenseTensor<T>> {
    let device = validate::colocated(&[
        ("grad_out", grad_out.device()),
        ("coord_map", coord_map.device()),
    ])?;
    let grads = validate::contiguous("grad_out", grad_out)?;
    let coords = validate::contiguous("coord_map", coord_map)?;
    let [batch, channels, _, _, _] = validate::rank::<5>("grad_out", grad_out.shape())?;
    let layout = TextureLayout::of_map(coord_map)?;
    validate::expect_shape(
        "grad_out",
        grad_out.shape(),
        &[
            batch,
            channels,
            layout.num_textures,
            layout.texture_height,
            layout.texture_width,
        ],
    )?;
    let (height, width) = image_hw;
    validate::positive("image_height", height)?;
    validate::positive("image_width", width)?;
    validate::element_count::<T>("image_hw", &[batch, channels, height, width])?;

    let texels = layout.texels();
    let backend = Backend::for_device(device);
    trace!(%backend, batch, channels, texels, "uv backward");

    let mut grad_image = DenseTensor::zeros_on(&[batch, channels, height, width], device);
    let out = grad_image
        .as_slice_mut()
        .ok_or(ResampleError::NonContiguous { label: "grad_image" })?;
    exec::scatter(backend, out, height * width, texels, |plane, texel, sink| {
        let upstream = grads[plane * texels + texel];
        interp::scatter(
            height,
            width,
            coords[2 * texel],
            coords[2 * texel + 1],
            policy,
            upstream,
            |index, value| sink(index, value),
        );
    })?;
    Ok(grad_image)
}
