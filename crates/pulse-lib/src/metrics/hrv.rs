use serde::{Deserialize, Serialize};

/// Time-domain variability over a run of RR intervals (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvTime {
    pub n: usize,
    pub avnn_ms: f64,
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
    /// Fraction of successive differences above 50 ms.
    pub pnn50: f64,
}

/// `None` with fewer than two intervals.
pub fn hrv_time(rr_ms: &[f64]) -> Option<HrvTime> {
    let n = rr_ms.len();
    if n < 2 {
        return None;
    }
    let avnn_ms = rr_ms.iter().sum::<f64>() / n as f64;
    let sdnn_ms =
        (rr_ms.iter().map(|x| (x - avnn_ms).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt();
    let diffs: Vec<f64> = rr_ms.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd_ms = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();
    let pnn50 = diffs.iter().filter(|d| d.abs() > 50.0).count() as f64 / diffs.len() as f64;

    Some(HrvTime {
        n,
        avnn_ms,
        sdnn_ms,
        rmssd_ms,
        pnn50,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn needs_two_intervals() {
        assert!(hrv_time(&[]).is_none());
        assert!(hrv_time(&[800.0]).is_none());
    }

    #[test]
    fn alternating_series() {
        let m = hrv_time(&[700.0, 800.0, 700.0, 800.0, 700.0]).unwrap();
        assert_eq!(m.n, 5);
        assert_close(m.avnn_ms, 740.0, 1e-9);
        assert_close(m.sdnn_ms, 54.772255750516614, 1e-9);
        assert_close(m.rmssd_ms, 100.0, 1e-9);
        assert_close(m.pnn50, 1.0, 1e-12);
    }

    #[test]
    fn constant_series_has_no_variability() {
        let m = hrv_time(&[820.0; 6]).unwrap();
        assert_close(m.sdnn_ms, 0.0, 1e-12);
        assert_close(m.rmssd_ms, 0.0, 1e-12);
        assert_close(m.pnn50, 0.0, 1e-12);
    }
}
