use super::TraceSample;
use crate::error::TraceError;
use std::path::Path;

/// One reading per line. Blank lines and `#` comments are skipped; line
/// numbers in errors are 1-based.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>, TraceError> {
    let values = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| {
            text.parse::<f64>().map_err(|_| TraceError::NotNumeric {
                line,
                text: text.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Err(TraceError::Empty);
    }
    Ok(values)
}

pub fn read_f64_series(path: &Path) -> Result<Vec<f64>, TraceError> {
    std::fs::read_to_string(path)
        .map_err(|source| TraceError::Io {
            path: path.display().to_string(),
            source,
        })
        .and_then(|text| parse_f64_series(&text))
}

/// Stamp a uniformly sampled series with millisecond timestamps starting at 0.
pub fn series_to_trace(values: &[f64], fs: f64) -> Result<Vec<TraceSample>, TraceError> {
    if !(fs > 0.0) || !fs.is_finite() {
        return Err(TraceError::InvalidRate(fs));
    }
    let step_ms = 1000.0 / fs;
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, &value)| TraceSample {
            time_ms: (i as f64 * step_ms).round() as i64,
            value,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let values = parse_f64_series("# camera red mean\n120.5\n\n119.75\n").unwrap();
        assert_eq!(values, vec![120.5, 119.75]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_f64_series("1.0\nabc\n").unwrap_err();
        assert!(matches!(err, TraceError::NotNumeric { line: 2, .. }));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(parse_f64_series("# nothing\n"), Err(TraceError::Empty)));
    }

    #[test]
    fn timestamps_follow_sampling_rate() {
        let trace = series_to_trace(&[1.0, 2.0, 3.0, 4.0], 30.0).unwrap();
        let times: Vec<i64> = trace.iter().map(|s| s.time_ms).collect();
        assert_eq!(times, vec![0, 33, 67, 100]);
        assert!(series_to_trace(&[1.0], 0.0).is_err());
    }

    #[test]
    fn reads_series_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.txt");
        std::fs::write(&path, "120.0\n119.5\n").unwrap();
        assert_eq!(read_f64_series(&path).unwrap(), vec![120.0, 119.5]);
        let missing = dir.path().join("missing.txt");
        assert!(matches!(read_f64_series(&missing), Err(TraceError::Io { .. })));
    }
}
