use rand::{rngs::StdRng, Rng};
use spiral_config::execution::rng_from_optional;
use st_sphere::{pool, uv, DenseTensor, Device, Interpolation};

const POLICIES: [Interpolation; 2] = [Interpolation::Nearest, Interpolation::Bilinear];
const DEVICES: [Device; 2] = [Device::Cpu, Device::Parallel];

fn random_tensor(rng: &mut StdRng, shape: &[usize], low: f64, high: f64) -> DenseTensor<f64> {
    let len = shape.iter().product();
    let data = (0..len).map(|_| rng.gen_range(low..high)).collect();
    DenseTensor::from_shape_vec(shape, data).unwrap()
}

/// Coordinates spilling one pixel past every border so that padding is
/// exercised alongside interior samples.
fn random_coords(
    rng: &mut StdRng,
    lead: &[usize],
    height: usize,
    width: usize,
) -> DenseTensor<f64> {
    let mut shape = lead.to_vec();
    shape.push(2);
    let points: usize = lead.iter().product();
    let data = (0..points)
        .flat_map(|_| {
            [
                rng.gen_range(-1.5..width as f64 + 0.5),
                rng.gen_range(-1.5..height as f64 + 0.5),
            ]
        })
        .collect::<Vec<f64>>();
    DenseTensor::from_shape_vec(&shape, data).unwrap()
}

fn dot(a: &DenseTensor<f64>, b: &DenseTensor<f64>) -> f64 {
    assert_eq!(a.shape(), b.shape());
    a.to_vec().iter().zip(b.to_vec()).map(|(x, y)| x * y).sum()
}

fn perturbed(x: &DenseTensor<f64>, index: usize, delta: f64) -> DenseTensor<f64> {
    let mut data = x.to_vec();
    data[index] += delta;
    DenseTensor::from_shape_vec(x.shape(), data)
        .unwrap()
        .to_device(x.device())
}

#[test]
fn uv_backward_is_the_transpose_of_forward() {
    let mut rng = rng_from_optional(Some(7), "uv-adjoint");
    let (batch, channels, height, width) = (2, 3, 6, 9);
    let (textures, th, tw) = (3, 4, 5);
    for device in DEVICES {
        let image = random_tensor(&mut rng, &[batch, channels, height, width], -1.0, 1.0)
            .to_device(device);
        let map = random_coords(&mut rng, &[textures, th, tw], height, width).to_device(device);
        let grad = random_tensor(&mut rng, &[batch, channels, textures, th, tw], -1.0, 1.0)
            .to_device(device);
        for policy in POLICIES {
            let out = uv::forward(&image, &map, textures, th, tw, policy).unwrap();
            let grad_image = uv::backward(&grad, &map, (height, width), policy).unwrap();
            let lhs = dot(&out, &grad);
            let rhs = dot(&image, &grad_image);
            assert!(
                (lhs - rhs).abs() < 1e-10 * (1.0 + lhs.abs()),
                "{policy} on {device}: {lhs} vs {rhs}"
            );
        }
    }
}

#[test]
fn uv_gradient_matches_finite_differences() {
    let mut rng = rng_from_optional(Some(11), "uv-finite-difference");
    let (height, width) = (5, 7);
    let image = random_tensor(&mut rng, &[1, 2, height, width], -1.0, 1.0);
    let map = random_coords(&mut rng, &[2, 3, 3], height, width);
    let grad = random_tensor(&mut rng, &[1, 2, 2, 3, 3], -1.0, 1.0);
    let step = 1e-4;

    for policy in POLICIES {
        let loss =
            |x: &DenseTensor<f64>| dot(&uv::forward(x, &map, 2, 3, 3, policy).unwrap(), &grad);
        let analytic = uv::backward(&grad, &map, (height, width), policy)
            .unwrap()
            .to_vec();
        for index in (0..image.len()).step_by(5) {
            let numeric = (loss(&perturbed(&image, index, step))
                - loss(&perturbed(&image, index, -step)))
                / (2.0 * step);
            assert!(
                (numeric - analytic[index]).abs() < 1e-6,
                "{policy} at {index}: numeric {numeric}, analytic {}",
                analytic[index]
            );
        }
    }
}

#[test]
fn pool_backward_is_the_transpose_of_forward() {
    let mut rng = rng_from_optional(Some(23), "pool-adjoint");
    let (batch, channels, height, width) = (2, 2, 7, 8);
    let (out_h, out_w, kernel) = (3, 4, 6);
    for device in DEVICES {
        let input = random_tensor(&mut rng, &[batch, channels, height, width], -1.0, 1.0)
            .to_device(device);
        let samples = random_coords(&mut rng, &[out_h, out_w, kernel], height, width)
            .to_device(device);
        let weights = random_tensor(&mut rng, &[out_h, out_w, kernel], 0.0, 0.5).to_device(device);
        let grad = random_tensor(&mut rng, &[batch, channels, out_h, out_w], -1.0, 1.0)
            .to_device(device);
        for policy in POLICIES {
            let out = pool::forward(&input, &samples, &weights, kernel, policy).unwrap();
            let grad_input =
                pool::backward(&grad, &samples, &weights, (height, width), kernel, policy).unwrap();
            let lhs = dot(&out, &grad);
            let rhs = dot(&input, &grad_input);
            assert!(
                (lhs - rhs).abs() < 1e-10 * (1.0 + lhs.abs()),
                "{policy} on {device}: {lhs} vs {rhs}"
            );
        }
    }
}

#[test]
fn pool_gradient_matches_finite_differences_on_irregular_grid() {
    // Irregular spherical grids are flattened to a single row of N vertices.
    let mut rng = rng_from_optional(Some(31), "pool-finite-difference");
    let vertices = 42;
    let (pooled, kernel) = (12, 7);
    let input = random_tensor(&mut rng, &[1, 3, 1, vertices], -1.0, 1.0);
    let data = (0..pooled * kernel)
        .flat_map(|_| [rng.gen_range(-0.5..vertices as f64 - 0.5), 0.0])
        .collect::<Vec<f64>>();
    let samples = DenseTensor::from_shape_vec(&[1, pooled, kernel, 2], data).unwrap();
    let weights = random_tensor(&mut rng, &[1, pooled, kernel], 0.0, 1.0 / kernel as f64);
    let grad = random_tensor(&mut rng, &[1, 3, 1, pooled], -1.0, 1.0);
    let step = 1e-4;

    for policy in POLICIES {
        let loss = |x: &DenseTensor<f64>| {
            dot(&pool::forward(x, &samples, &weights, kernel, policy).unwrap(), &grad)
        };
        let analytic = pool::backward(&grad, &samples, &weights, (1, vertices), kernel, policy)
            .unwrap()
            .to_vec();
        for index in (0..input.len()).step_by(3) {
            let numeric = (loss(&perturbed(&input, index, step))
                - loss(&perturbed(&input, index, -step)))
                / (2.0 * step);
            assert!(
                (numeric - analytic[index]).abs() < 1e-6,
                "{policy} at {index}: numeric {numeric}, analytic {}",
                analytic[index]
            );
        }
    }
}
