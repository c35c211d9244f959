//! One-dimensional interpolation over tabulated curves.
//!
//! Filter transmittance is resampled with a not-a-knot cubic spline and stellar
//! magnitudes with straight line segments. Outside the tabulated support both
//! interpolators defer to an [`OutOfBounds`] policy, which defaults to filling
//! with zero.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least {0} points")]
    InsufficientData(usize),
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in strictly ascending order")]
    UnsortedData,
    #[error("Spline system could not be solved")]
    SingularSystem,
}

/// What an interpolator returns for abscissae outside its tabulated range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfBounds {
    /// Evaluate to a constant
    Fill(f64),
    /// Fail with [`InterpError::OutOfBounds`]
    Error,
}

impl Default for OutOfBounds {
    fn default() -> Self {
        OutOfBounds::Fill(0.0)
    }
}

impl OutOfBounds {
    fn resolve(&self, x: f64, min_x: f64, max_x: f64) -> Result<f64, InterpError> {
        match self {
            OutOfBounds::Fill(value) => Ok(*value),
            OutOfBounds::Error => Err(InterpError::OutOfBounds(x, min_x, max_x)),
        }
    }
}

fn validate(xs: &[f64], ys: &[f64], min_points: usize) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }

    if xs.len() < min_points {
        return Err(InterpError::InsufficientData(min_points));
    }

    // NaN fails this comparison as well
    if !xs.windows(2).all(|pair| pair[0] < pair[1]) {
        return Err(InterpError::UnsortedData);
    }

    Ok(())
}

/// Index `i` of the segment `[xs[i], xs[i + 1]]` holding an in-range `x`
fn segment(xs: &[f64], x: f64) -> usize {
    let above = xs.partition_point(|&probe| probe <= x);
    above.saturating_sub(1).min(xs.len() - 2)
}

/// Piecewise-linear interpolation over borrowed samples.
///
/// # Examples
///
/// ```rust
/// use photcal::photometry::interp::{LinearInterpolator, OutOfBounds};
///
/// let xs = [0.0, 1.0, 2.0, 3.0];
/// let ys = [0.0, 1.0, 4.0, 9.0];
/// let interp = LinearInterpolator::new(&xs, &ys, OutOfBounds::Fill(0.0)).unwrap();
///
/// assert_eq!(interp.at(1.5).unwrap(), 2.5);
/// assert_eq!(interp.at(7.0).unwrap(), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct LinearInterpolator<'a> {
    xs: &'a [f64],
    ys: &'a [f64],
    out_of_bounds: OutOfBounds,
}

impl<'a> LinearInterpolator<'a> {
    /// Validate the samples; `xs` must be strictly ascending with at least 2 points
    pub fn new(
        xs: &'a [f64],
        ys: &'a [f64],
        out_of_bounds: OutOfBounds,
    ) -> Result<Self, InterpError> {
        validate(xs, ys, 2)?;
        Ok(Self {
            xs,
            ys,
            out_of_bounds,
        })
    }

    pub fn at(&self, x: f64) -> Result<f64, InterpError> {
        let min_x = self.xs[0];
        let max_x = self.xs[self.xs.len() - 1];
        if !(min_x..=max_x).contains(&x) {
            return self.out_of_bounds.resolve(x, min_x, max_x);
        }

        let i = segment(self.xs, x);
        let (x1, x2) = (self.xs[i], self.xs[i + 1]);
        let (y1, y2) = (self.ys[i], self.ys[i + 1]);

        let t = (x - x1) / (x2 - x1);
        Ok(y1 + t * (y2 - y1))
    }
}

/// Cubic spline with not-a-knot end conditions.
///
/// The third derivative is continuous across the second and the penultimate
/// knot, which makes the spline reproduce any cubic polynomial exactly. Two
/// samples degrade to a straight line and three samples to the parabola through
/// them.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative of the spline at each knot
    second_derivs: Vec<f64>,
    out_of_bounds: OutOfBounds,
}

impl CubicSpline {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, out_of_bounds: OutOfBounds) -> Result<Self, InterpError> {
        validate(&xs, &ys, 2)?;

        let second_derivs = match xs.len() {
            2 => vec![0.0; 2],
            3 => {
                let slope_left = (ys[1] - ys[0]) / (xs[1] - xs[0]);
                let slope_right = (ys[2] - ys[1]) / (xs[2] - xs[1]);
                let curvature = 2.0 * (slope_right - slope_left) / (xs[2] - xs[0]);
                vec![curvature; 3]
            }
            _ => not_a_knot_second_derivs(&xs, &ys)?,
        };

        Ok(Self {
            xs,
            ys,
            second_derivs,
            out_of_bounds,
        })
    }

    pub fn at(&self, x: f64) -> Result<f64, InterpError> {
        let min_x = self.xs[0];
        let max_x = self.xs[self.xs.len() - 1];
        if !(min_x..=max_x).contains(&x) {
            return self.out_of_bounds.resolve(x, min_x, max_x);
        }

        let i = segment(&self.xs, x);
        let h = self.xs[i + 1] - self.xs[i];
        let right = self.xs[i + 1] - x;
        let left = x - self.xs[i];
        let (m1, m2) = (self.second_derivs[i], self.second_derivs[i + 1]);

        Ok(m1 * right.powi(3) / (6.0 * h)
            + m2 * left.powi(3) / (6.0 * h)
            + (self.ys[i] / h - m1 * h / 6.0) * right
            + (self.ys[i + 1] / h - m2 * h / 6.0) * left)
    }
}

fn not_a_knot_second_derivs(xs: &[f64], ys: &[f64]) -> Result<Vec<f64>, InterpError> {
    let n = xs.len();
    let h: Vec<f64> = xs.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let slopes: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

    let mut system = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);

    // Third derivative continuous at xs[1]
    system[(0, 0)] = h[1];
    system[(0, 1)] = -(h[0] + h[1]);
    system[(0, 2)] = h[0];

    for i in 1..n - 1 {
        system[(i, i - 1)] = h[i - 1];
        system[(i, i)] = 2.0 * (h[i - 1] + h[i]);
        system[(i, i + 1)] = h[i];
        rhs[i] = 6.0 * (slopes[i] - slopes[i - 1]);
    }

    // Third derivative continuous at xs[n - 2]
    system[(n - 1, n - 3)] = h[n - 2];
    system[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
    system[(n - 1, n - 1)] = h[n - 3];

    let solution = system
        .lu()
        .solve(&rhs)
        .ok_or(InterpError::SingularSystem)?;
    Ok(solution.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_exact_match() {
        let xs = vec![1.0, 2.0, 3.0, 4.0];
        let ys = vec![10.0, 20.0, 30.0, 40.0];
        let interp = LinearInterpolator::new(&xs, &ys, OutOfBounds::Error).unwrap();
        assert_eq!(interp.at(2.0).unwrap(), 20.0);
        assert_eq!(interp.at(4.0).unwrap(), 40.0);
        assert_eq!(interp.at(1.0).unwrap(), 10.0);
    }

    #[test]
    fn test_linear_interpolation() {
        let xs = vec![1.0, 2.0, 3.0];
        let ys = vec![10.0, 20.0, 30.0];
        let interp = LinearInterpolator::new(&xs, &ys, OutOfBounds::Error).unwrap();
        assert_eq!(interp.at(1.5).unwrap(), 15.0);
        assert_eq!(interp.at(2.5).unwrap(), 25.0);
    }

    #[test]
    fn test_linear_out_of_bounds_policies() {
        let xs = vec![1.0, 2.0, 3.0];
        let ys = vec![10.0, 20.0, 30.0];

        let strict = LinearInterpolator::new(&xs, &ys, OutOfBounds::Error).unwrap();
        assert!(matches!(
            strict.at(0.5),
            Err(InterpError::OutOfBounds(_, _, _))
        ));
        assert!(matches!(
            strict.at(3.5),
            Err(InterpError::OutOfBounds(_, _, _))
        ));

        let filled = LinearInterpolator::new(&xs, &ys, OutOfBounds::default()).unwrap();
        assert_eq!(filled.at(0.5).unwrap(), 0.0);

        let custom = LinearInterpolator::new(&xs, &ys, OutOfBounds::Fill(-1.0)).unwrap();
        assert_eq!(custom.at(99.0).unwrap(), -1.0);
    }

    #[test]
    fn test_mismatched_lengths() {
        let xs = vec![1.0, 2.0, 3.0];
        let ys = vec![10.0, 20.0];
        assert!(matches!(
            LinearInterpolator::new(&xs, &ys, OutOfBounds::Error),
            Err(InterpError::MismatchedLengths)
        ));
    }

    #[test]
    fn test_insufficient_data() {
        let xs = vec![1.0];
        let ys = vec![10.0];
        assert!(matches!(
            CubicSpline::new(xs, ys, OutOfBounds::Error),
            Err(InterpError::InsufficientData(2))
        ));
    }

    #[test]
    fn test_unsorted_data() {
        let xs = vec![2.0, 1.0, 3.0];
        let ys = vec![20.0, 10.0, 30.0];
        assert!(matches!(
            LinearInterpolator::new(&xs, &ys, OutOfBounds::Error),
            Err(InterpError::UnsortedData)
        ));

        let duplicated = vec![1.0, 2.0, 2.0, 3.0];
        assert!(matches!(
            CubicSpline::new(duplicated, vec![0.0; 4], OutOfBounds::Error),
            Err(InterpError::UnsortedData)
        ));
    }

    #[test]
    fn test_spline_reproduces_cubic() {
        let cubic = |x: f64| x.powi(3) - 2.0 * x + 1.0;
        let xs: Vec<f64> = vec![0.0, 1.0, 2.5, 3.0, 4.0, 6.0];
        let ys: Vec<f64> = xs.iter().map(|&x| cubic(x)).collect();
        let spline = CubicSpline::new(xs, ys, OutOfBounds::Error).unwrap();

        for x in [0.0, 0.3, 1.7, 2.75, 3.5, 5.9, 6.0] {
            assert_relative_eq!(spline.at(x).unwrap(), cubic(x), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_spline_passes_through_knots() {
        let xs = vec![400.0, 450.0, 500.0, 550.0, 600.0];
        let ys = vec![0.0, 0.6, 0.9, 0.5, 0.0];
        let spline = CubicSpline::new(xs.clone(), ys.clone(), OutOfBounds::Error).unwrap();

        for (x, y) in xs.iter().zip(ys.iter()) {
            assert_relative_eq!(spline.at(*x).unwrap(), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_spline_small_tables() {
        let line = CubicSpline::new(vec![0.0, 2.0], vec![1.0, 5.0], OutOfBounds::Error).unwrap();
        assert_relative_eq!(line.at(0.5).unwrap(), 2.0, epsilon = 1e-12);

        // y = x^2 through three samples
        let parabola =
            CubicSpline::new(vec![0.0, 1.0, 3.0], vec![0.0, 1.0, 9.0], OutOfBounds::Error)
                .unwrap();
        assert_relative_eq!(parabola.at(2.0).unwrap(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(parabola.at(0.5).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_spline_fill_outside_support() {
        let spline = CubicSpline::new(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![1.0, 1.0, 1.0, 1.0],
            OutOfBounds::Fill(0.0),
        )
        .unwrap();
        assert_eq!(spline.at(0.999).unwrap(), 0.0);
        assert_eq!(spline.at(4.001).unwrap(), 0.0);
        assert_relative_eq!(spline.at(2.2).unwrap(), 1.0, epsilon = 1e-12);
    }
}
