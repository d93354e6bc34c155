use serde::{Deserialize, Serialize};

/// Running mean and variance of a stream of values (Welford's algorithm).
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    sq_dev_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;
        let dev_old = val - self.mean;
        self.mean += dev_old / self.n_vals as f64;
        self.sq_dev_sum += dev_old * (val - self.mean);
    }

    pub fn report(&self) -> AccumulatorReport {
        let std_dev = match self.n_vals {
            0 | 1 => f64::NAN,
            n => (self.sq_dev_sum / (n - 1) as f64).sqrt(),
        };
        AccumulatorReport {
            mean: if self.n_vals == 0 { f64::NAN } else { self.mean },
            std_dev,
        }
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        iter.into_iter().for_each(|val| acc.add(val));
        acc
    }
}

/// Counts of `vals` in `n_bins` equal bins over `[0, 1]`.
///
/// The last bin is closed so that 1 is counted; values outside `[0, 1]` are skipped.
pub fn histogram<I: IntoIterator<Item = f64>>(vals: I, n_bins: usize) -> Vec<usize> {
    let mut counts = vec![0; n_bins];
    if n_bins == 0 {
        return counts;
    }
    for val in vals {
        if !(0.0..=1.0).contains(&val) {
            continue;
        }
        let i_bin = ((val * n_bins as f64) as usize).min(n_bins - 1);
        counts[i_bin] += 1;
    }
    counts
}
