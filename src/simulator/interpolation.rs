use serde::{Deserialize, Serialize};

/// Behaviour of a sampled profile past its last sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extrapolation {
    /// Free decay of the underlying linear system from the last sampled state
    #[default]
    Decay,
    /// Hold the last sampled value
    Flat,
    /// Continue the last slope, floored at zero
    Linear,
}

/// Samples of a scalar signal together with its exact time derivative,
/// evaluated with piecewise cubic Hermite interpolation.
///
/// Repeated sample times encode jumps: the table is right-continuous, so a
/// query at a repeated time returns the later sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HermiteTable {
    times: Vec<f64>,
    values: Vec<f64>,
    slopes: Vec<f64>,
}

impl HermiteTable {
    pub fn new(times: Vec<f64>, values: Vec<f64>, slopes: Vec<f64>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        debug_assert_eq!(times.len(), slopes.len());
        debug_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        HermiteTable {
            times,
            values,
            slopes,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_time(&self) -> f64 {
        self.times.first().copied().unwrap_or(0.0)
    }

    pub fn last_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn last_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    pub fn last_slope(&self) -> f64 {
        self.slopes.last().copied().unwrap_or(0.0)
    }

    /// Interpolated value at `t`, clamped to the sampled range
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.times.len();
        if n == 0 {
            return 0.0;
        }
        let i = self.times.partition_point(|&x| x <= t);
        if i == 0 {
            return self.values[0];
        }
        if i >= n {
            return self.values[n - 1];
        }

        let (t0, t1) = (self.times[i - 1], self.times[i]);
        let h = t1 - t0;
        let s = (t - t0) / h;
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * self.values[i - 1]
            + h10 * h * self.slopes[i - 1]
            + h01 * self.values[i]
            + h11 * h * self.slopes[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exp_table(k: f64, n: usize, end: f64) -> HermiteTable {
        let times: Vec<f64> = (0..n).map(|i| end * i as f64 / (n - 1) as f64).collect();
        let values = times.iter().map(|&t| (-k * t).exp()).collect();
        let slopes = times.iter().map(|&t| -k * (-k * t).exp()).collect();
        HermiteTable::new(times, values, slopes)
    }

    #[test]
    fn reproduces_exponential_between_samples() {
        let table = exp_table(0.5, 200, 20.0);
        for &t in &[0.013, 1.234, 7.77, 19.99] {
            assert_relative_eq!(table.eval(t), (-0.5f64 * t).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn right_continuous_at_jumps() {
        let table = HermiteTable::new(
            vec![0.0, 1.0, 1.0, 2.0],
            vec![0.0, 0.0, 5.0, 5.0],
            vec![0.0, 0.0, 0.0, 0.0],
        );
        assert_eq!(table.eval(1.0), 5.0);
        assert!(table.eval(0.999_999) < 1e-3);
        assert_eq!(table.eval(1.5), 5.0);
    }

    #[test]
    fn clamps_outside_range() {
        let table = exp_table(1.0, 10, 1.0);
        assert_eq!(table.eval(-1.0), 1.0);
        assert_eq!(table.eval(5.0), table.last_value());
    }
}
