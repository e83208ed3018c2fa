use crate::{PipelineError, Result};

/// Returns `num` numbers evenly spaced on a log10 scale
///
/// The exponents go from `start` to `stop`, `stop` being excluded if `endpoint` is false
pub fn logspace(start: f64, stop: f64, num: usize, endpoint: bool) -> Vec<f64> {
    let div = if endpoint { num.saturating_sub(1) } else { num };
    let step = if div > 0 {
        (stop - start) / div as f64
    } else {
        0.
    };
    (0..num)
        .map(|i| 10f64.powf(start + i as f64 * step))
        .collect()
}

/// Interpolant behavior outside the sample range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bounds {
    /// Evaluation outside the range is an error
    #[default]
    Error,
    /// Linear extrapolation from the first or last segment
    Extrapolate,
}

/// Piecewise linear interpolation
#[derive(Debug, Clone)]
pub struct Interp1d {
    x: Vec<f64>,
    y: Vec<f64>,
    bounds: Bounds,
}
impl Interp1d {
    /// Creates a linear interpolant from the samples (`x`,`y`)
    ///
    /// The samples are sorted according to `x`
    pub fn new(x: &[f64], y: &[f64], bounds: Bounds) -> Result<Self> {
        let mut xy: Vec<(f64, f64)> = x
            .iter()
            .zip(y)
            .filter(|(x, _)| !x.is_nan())
            .map(|(&x, &y)| (x, y))
            .collect();
        if xy.len() < 2 {
            return Err(PipelineError::Interpolation(xy.len()));
        }
        xy.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (x, y) = xy.into_iter().unzip();
        Ok(Self { x, y, bounds })
    }
    /// Returns the sampling range
    pub fn range(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }
    fn check(&self, x: f64) -> Result<()> {
        let (lo, hi) = self.range();
        match self.bounds {
            Bounds::Error if x < lo || x > hi => Err(PipelineError::OutOfRange { x, lo, hi }),
            _ => Ok(()),
        }
    }
    fn linear(&self, x: f64) -> f64 {
        let n = self.x.len();
        let i = self
            .x
            .partition_point(|&xi| xi <= x)
            .saturating_sub(1)
            .min(n - 2);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        if x1 == x0 {
            y0
        } else {
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        }
    }
    /// Evaluates the interpolant at `x`
    pub fn eval(&self, x: f64) -> Result<f64> {
        self.check(x)?;
        Ok(self.linear(x))
    }
    /// Evaluates the interpolant at each `x`
    pub fn eval_all(&self, x: &[f64]) -> Result<Vec<f64>> {
        x.iter().map(|&x| self.eval(x)).collect()
    }
    /// Integrates the interpolant from `lo` to `hi`
    ///
    /// The trapezoidal rule over the samples within the interval is exact
    /// for a piecewise linear function
    pub fn integrate(&self, lo: f64, hi: f64) -> Result<f64> {
        if lo > hi {
            return self.integrate(hi, lo).map(|x| -x);
        }
        self.check(lo)?;
        self.check(hi)?;
        let mut knots = vec![lo];
        knots.extend(self.x.iter().cloned().filter(|&x| x > lo && x < hi));
        knots.push(hi);
        Ok(knots
            .windows(2)
            .map(|w| 0.5 * (self.linear(w[0]) + self.linear(w[1])) * (w[1] - w[0]))
            .sum())
    }
}
