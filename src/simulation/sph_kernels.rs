use serde::{Deserialize, Serialize};

use crate::{
    floating_type_mod::{FT, PI},
    V2,
};

/**
 * The density estimate is padded with this value so that dividing by the
 * density of an isolated particle can never fault.
 */
pub const DENSITY_EPSILON: FT = 1e-6;

/**
 * poly6 kernel with proper 2D normalization. Only needs the squared
 * distance, so callers can skip the square root in the density loop.
 */
pub fn poly6_kernel_2d(r_sq: FT, h: FT) -> FT {
    let h_sq = h * h;
    if r_sq >= h_sq {
        return 0.;
    }
    let v = h_sq - r_sq;
    4. / (PI * h.powi(8)) * v * v * v
}

pub fn spiky_kernel_2d(r: FT, h: FT) -> FT {
    if r >= h {
        return 0.;
    }
    let v = h - r;
    10. / (PI * h.powi(5)) * v * v * v
}

/**
 * Calculate the derivative dW/dx where W=spiky(|x-y|, h) and x-y=diff.
 *
 * Returns zero for coinciding particles since the direction is undefined
 * there (the spiky kernel has a kink at the origin).
 */
pub fn spiky_kernel_2d_deriv(mut diff: V2, h: FT) -> V2 {
    let r = diff.norm();
    if r >= h || r <= 1.0e-5 * h {
        return V2::zeros();
    }
    diff.unscale_mut(r);

    let v = h - r;
    -30. / (PI * h.powi(5)) * v * v * diff
}

pub fn cubic_kernel_unnormalized(q: FT) -> FT {
    if q < 0.5 {
        6. * (q * q * q - q * q) + 1.
    } else if q < 1. {
        let v = 1. - q;
        2. * (v * v * v)
    } else {
        0.
    }
}

pub fn cubic_kernel_unnormalized_deriv(q: FT) -> FT {
    if q < 0.5 {
        18. * q * q - 12. * q
    } else if q < 1. {
        let v = 1. - q;
        -6. * v * v
    } else {
        0.
    }
}

/**
 * r is the distance to the center.
 * h is the smoothing length; the support radius is 2h.
 */
pub fn cubic_kernel_2d(r: FT, h: FT) -> FT {
    let norm_factor = 10. / (7. * PI * (h * h));
    norm_factor * cubic_kernel_unnormalized(r / (2. * h))
}

/**
 * Calculate the derivative dW/dx where W=kernel(|x-y|/h) and x-y=diff.
 */
pub fn cubic_kernel_2d_deriv(mut diff: V2, h: FT) -> V2 {
    let r = diff.norm();
    let q: FT = r / (2. * h);
    if q <= 1.0e-5 {
        return V2::zeros();
    }
    diff.unscale_mut(r);

    let norm_factor = 10. / (7. * PI * (h * h));
    norm_factor * cubic_kernel_unnormalized_deriv(q) / (2. * h) * diff
}

/**
 * Kernel pairing used by the density and force passes. `Poly6Spiky` is the
 * classic WCSPH combination (poly6 for density, spiky for gradients),
 * `CubicSpline` uses the cubic spline for both.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelType {
    Poly6Spiky,
    CubicSpline,
}

impl KernelType {
    pub fn support_radius(self, h: FT) -> FT {
        match self {
            KernelType::Poly6Spiky => h,
            KernelType::CubicSpline => 2. * h,
        }
    }

    pub fn density_kernel(self, r_sq: FT, h: FT) -> FT {
        match self {
            KernelType::Poly6Spiky => poly6_kernel_2d(r_sq, h),
            KernelType::CubicSpline => cubic_kernel_2d(r_sq.sqrt(), h),
        }
    }

    pub fn kernel_deriv(self, diff: V2, h: FT) -> V2 {
        match self {
            KernelType::Poly6Spiky => spiky_kernel_2d_deriv(diff, h),
            KernelType::CubicSpline => cubic_kernel_2d_deriv(diff, h),
        }
    }
}

#[cfg(test)]
fn integrate_kernel_2d(support_radius: FT, kernel: impl Fn(V2) -> FT) -> FT {
    use crate::vec2f;

    let grid_size = 400;
    let square_len = 2. * support_radius / grid_size as FT;
    let square_area = square_len * square_len;

    // accumulate in f64 so single-precision rounding does not hide a bad
    // normalization factor
    let mut integral: f64 = 0.;
    for y in 0..grid_size {
        for x in 0..grid_size {
            let integration_point = vec2f(
                (x as FT + 0.5) * square_len - support_radius,
                (y as FT + 0.5) * square_len - support_radius,
            );
            integral += (kernel(integration_point) * square_area) as f64;
        }
    }
    integral as FT
}

#[test]
fn poly6_kernel_2d_integration_test() {
    let h = 5.;
    let integral = integrate_kernel_2d(h, |p| poly6_kernel_2d(p.norm_squared(), h));
    println!("Integration of 2D poly6 kernel with h={:.2}: {}", h, integral);
    assert!((integral - 1.0).abs() < 0.001);
}

#[test]
fn spiky_kernel_2d_integration_test() {
    let h = 5.;
    let integral = integrate_kernel_2d(h, |p| spiky_kernel_2d(p.norm(), h));
    println!("Integration of 2D spiky kernel with h={:.2}: {}", h, integral);
    assert!((integral - 1.0).abs() < 0.001);
}

#[test]
fn cubic_kernel_2d_integration_test() {
    let h = 5.;
    let integral = integrate_kernel_2d(2. * h, |p| cubic_kernel_2d(p.norm(), h));
    println!("Integration of 2D cubic kernel with h={:.2}: {}", h, integral);
    assert!((integral - 1.0).abs() < 0.001);
}

#[cfg(test)]
fn check_kernel_derivative(
    support_radius: FT,
    skip_center_radius: FT,
    kernel: impl Fn(V2) -> FT,
    kernel_deriv: impl Fn(V2) -> V2,
) {
    use crate::vec2f;

    let test_grid_size = 100;
    let diff = support_radius * 1e-2;
    let diff_half = diff * 0.5;

    let probe_offset = 2. * support_radius / test_grid_size as FT;

    for y in 0..=test_grid_size {
        for x in 0..=test_grid_size {
            let probe_point = vec2f(
                (x as FT + 0.5) * probe_offset - support_radius,
                (y as FT + 0.5) * probe_offset - support_radius,
            );
            if probe_point.norm() < skip_center_radius {
                continue;
            }

            let analytical_deriv = kernel_deriv(probe_point);

            let x_neg: FT = kernel(probe_point + vec2f(-diff_half, 0.));
            let x_pos: FT = kernel(probe_point + vec2f(diff_half, 0.));
            let y_neg: FT = kernel(probe_point + vec2f(0., -diff_half));
            let y_pos: FT = kernel(probe_point + vec2f(0., diff_half));

            let approx_deriv = vec2f((x_pos - x_neg) / diff, (y_pos - y_neg) / diff);
            let absolute_error = analytical_deriv - approx_deriv;

            assert!(
                absolute_error.x.abs() < 0.001 && absolute_error.y.abs() < 0.001,
                "kernel derivative mismatch at [{:+.4}, {:+.4}]: analytical=[{:+.7}, {:+.7}] approx=[{:+.7}, {:+.7}]",
                probe_point.x,
                probe_point.y,
                analytical_deriv.x,
                analytical_deriv.y,
                approx_deriv.x,
                approx_deriv.y,
            );
        }
    }
}

#[test]
fn spiky_kernel_2d_derivative_test() {
    let h = 5.;
    // the spiky kernel is not differentiable at the origin, skip probes there
    check_kernel_derivative(
        h,
        0.15 * h,
        |p| spiky_kernel_2d(p.norm(), h),
        |p| spiky_kernel_2d_deriv(p, h),
    );
}

#[test]
fn cubic_kernel_2d_derivative_test() {
    let h = 5.;
    check_kernel_derivative(
        2. * h,
        0.,
        |p| cubic_kernel_2d(p.norm(), h),
        |p| cubic_kernel_2d_deriv(p, h),
    );
}
