//! Adaptive Gauss-Kronrod Quadrature
//!
//! 15-point Kronrod rule with the embedded 7-point Gauss rule as error
//! estimate, bisecting intervals until the estimate meets the tolerance or
//! the depth budget runs out.
//!
//! Used for the band kernel sqrt(2/pi) * integral_y^x exp(t^2 / 2) dt.

use std::f64::consts::PI;

/// Default bisection depth for the tail kernel
const TAIL_MAX_DEPTH: u32 = 5;
/// Default relative tolerance for the tail kernel
const TAIL_TOLERANCE: f64 = 1e-8;

/// Kronrod abscissae on [0, 1]; odd indices and the centre are Gauss nodes
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

/// Gauss weights for XGK[1], XGK[3], XGK[5] and the centre
const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

/// Kronrod estimate and |Kronrod - Gauss| on [a, b]
fn kronrod_15<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> (f64, f64) {
    let centre = 0.5 * (a + b);
    let half = 0.5 * (b - a);

    let fc = f(centre);
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;

    for (j, (&x, &w)) in XGK.iter().zip(WGK.iter()).take(7).enumerate() {
        let dx = half * x;
        let pair = f(centre - dx) + f(centre + dx);
        kronrod += w * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }

    (kronrod * half, ((kronrod - gauss) * half).abs())
}

fn adapt<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, depth: u32, tol: f64) -> f64 {
    let (estimate, error) = kronrod_15(f, a, b);
    if depth == 0 || error <= tol * estimate.abs() || error <= f64::EPSILON * estimate.abs() {
        return estimate;
    }
    let mid = 0.5 * (a + b);
    adapt(f, a, mid, depth - 1, tol) + adapt(f, mid, b, depth - 1, tol)
}

/// Integral of `f` over [a, b]; reversed limits negate the result
pub fn integrate<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, max_depth: u32, tol: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    if b < a {
        return -integrate(f, b, a, max_depth, tol);
    }
    adapt(&f, a, b, max_depth, tol)
}

/// sqrt(2/pi) * integral from y to x of exp(t^2 / 2) dt
pub fn tail_integral(x: f64, y: f64) -> f64 {
    let area = integrate(|t| (0.5 * t * t).exp(), y, x, TAIL_MAX_DEPTH, TAIL_TOLERANCE);
    (2.0 / PI).sqrt() * area
}
