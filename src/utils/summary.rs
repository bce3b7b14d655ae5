/// Running mean and population variance of a stream of values (Welford).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStatistic {
    num_items: usize,
    mean: f64,
    sum_squares: f64,
}

impl RunningStatistic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a new value
    pub fn update(&mut self, x: f64) {
        self.num_items += 1;
        let old_mean = self.mean;
        self.mean += (x - old_mean) / self.num_items as f64;
        self.sum_squares += (x - old_mean) * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.num_items
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (divides by the count).
    pub fn var(&self) -> f64 {
        if self.num_items == 0 {
            0.0
        } else {
            self.sum_squares / self.num_items as f64
        }
    }

    pub fn std(&self) -> f64 {
        self.var().sqrt()
    }
}

impl FromIterator<f64> for RunningStatistic {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stat = RunningStatistic::new();
        for x in iter {
            stat.update(x);
        }
        stat
    }
}
