use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read one sample per line from a single-column text stream.
///
/// Blank lines and lines starting with `#` are ignored. Every other line must
/// hold one finite number; the first bad line aborts with its 1-based line
/// number.
pub fn read_samples<R: BufRead>(reader: R) -> Result<Vec<f64>> {
    let mut samples = Vec::new();
    for (number, line) in (1..).zip(reader.lines()) {
        let line = line.with_context(|| format!("reading line {number}"))?;
        let field = line.trim();
        if field.is_empty() || field.starts_with('#') {
            continue;
        }
        let value = field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .with_context(|| format!("line {number}: expected a finite sample, got {field:?}"))?;
        samples.push(value);
    }
    if samples.is_empty() {
        bail!("input holds no samples");
    }
    log::debug!("read {} samples", samples.len());
    Ok(samples)
}

pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_samples(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> Result<Vec<f64>> {
        read_samples(text.as_bytes())
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# lead II\n0.5\n\n-1.25\n  2 \n";
        assert_eq!(parse(text).expect("parse"), vec![0.5, -1.25, 2.0]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse("1.0\nabc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let err = parse("1.0\n2.0\nNaN\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
        assert!(parse("inf\n").is_err());
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse("# nothing\n").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "0.1\n# gap\n0.2").expect("write");
        let samples = read_f64_series(file.path()).expect("read");
        assert_eq!(samples, vec![0.1, 0.2]);
        let err = read_f64_series(Path::new("/nonexistent/ecg.txt")).unwrap_err();
        assert!(format!("{err:#}").contains("opening /nonexistent/ecg.txt"));
    }
}
