use std::collections::VecDeque;

/// Streaming moving-average smoother with an exponentially tracked baseline.
///
/// Each accepted value is averaged over the last `window` inputs; the
/// baseline follows the smoothed value with weight `alpha`. The output is the
/// scaled distance of the smoothed value below the baseline, which turns the
/// brightness dip of a pulse into a positive excursion centred on zero.
#[derive(Debug, Clone)]
pub struct BaselineFilter {
    window: usize,
    alpha: f64,
    scale: f64,
    recent: VecDeque<f64>,
    baseline: Option<f64>,
}

impl BaselineFilter {
    pub fn new(window: usize, alpha: f64, scale: f64) -> Self {
        let window = window.max(1);
        Self {
            window,
            alpha,
            scale,
            recent: VecDeque::with_capacity(window),
            baseline: None,
        }
    }

    /// Feed one raw reading. Returns `None`, leaving state untouched, when
    /// the reading is non-finite or would push the output out of `f64` range.
    pub fn process(&mut self, raw: f64) -> Option<f64> {
        if !raw.is_finite() {
            return None;
        }
        let evicted = if self.recent.len() == self.window {
            self.recent.pop_front()
        } else {
            None
        };
        self.recent.push_back(raw);
        let smoothed = self.recent.iter().sum::<f64>() / self.recent.len() as f64;
        let baseline = match self.baseline {
            None => smoothed,
            Some(prev) => prev * (1.0 - self.alpha) + smoothed * self.alpha,
        };
        let output = (baseline - smoothed) * self.scale;

        if !(smoothed.is_finite() && baseline.is_finite() && output.is_finite()) {
            self.recent.pop_back();
            if let Some(old) = evicted {
                self.recent.push_front(old);
            }
            return None;
        }
        self.baseline = Some(baseline);
        Some(output)
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn reset(&mut self) {
        self.recent.clear();
        self.baseline = None;
    }
}
