use crate::error::{Result, SpectralEventsError};

/// Labelled trial matrix parsed from delimited text
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledRows {
    /// Condition label per trial (first column)
    pub labels: Vec<i64>,
    /// Samples per trial (remaining columns)
    pub trials: Vec<Vec<f64>>,
}

#[inline]
fn is_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b',' || b == b';'
}

fn parse_f64(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.parse::<f64>().ok()
}

/// Split one line into numeric values, failing on the first malformed token
fn parse_line(line: &[u8], line_no: usize, values: &mut Vec<f64>) -> Result<()> {
    values.clear();
    let mut val_start = 0;
    let mut in_val = false;

    for (j, &b) in line.iter().enumerate() {
        if is_separator(b) {
            if in_val {
                values.push(parse_token(&line[val_start..j], line_no)?);
                in_val = false;
            }
        } else if !in_val {
            val_start = j;
            in_val = true;
        }
    }
    if in_val {
        values.push(parse_token(&line[val_start..], line_no)?);
    }
    Ok(())
}

fn parse_token(token: &[u8], line_no: usize) -> Result<f64> {
    match parse_f64(token) {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(SpectralEventsError::Parse(format!(
            "line {}: '{}' is not a finite number",
            line_no,
            String::from_utf8_lossy(token)
        ))),
    }
}

/// Parse delimited text where each line is `label, sample, sample, ...`
///
/// Works on raw bytes so memory-mapped files can be parsed without copying.
/// Blank lines and lines starting with `#` are skipped. The first remaining
/// line may be a header; any later line that fails to parse is an error.
/// Rows whose column count differs from the first data row are skipped with a
/// warning.
pub fn parse_labelled_rows(content: &[u8]) -> Result<LabelledRows> {
    let mut labels = Vec::new();
    let mut trials = Vec::new();
    let mut col_count = 0;
    let mut values = Vec::with_capacity(1024);
    let mut first_content_line = true;

    for (idx, raw_line) in content.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = match raw_line.last() {
            Some(b'\r') => &raw_line[..raw_line.len() - 1],
            _ => raw_line,
        };

        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        let first = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(0);
        if line[first] == b'#' {
            continue;
        }

        let may_be_header = std::mem::replace(&mut first_content_line, false);
        if let Err(e) = parse_line(line, line_no, &mut values) {
            if may_be_header {
                log::debug!("Treating line {} as a header", line_no);
                continue;
            }
            return Err(e);
        }

        if values.len() < 2 {
            return Err(SpectralEventsError::Parse(format!(
                "line {}: expected a label followed by samples",
                line_no
            )));
        }

        if trials.is_empty() {
            col_count = values.len();
        } else if values.len() != col_count {
            log::warn!(
                "Row {} has inconsistent column count ({} vs {}), skipping",
                line_no,
                values.len(),
                col_count
            );
            continue;
        }

        let label = values[0];
        if label.fract() != 0.0 {
            return Err(SpectralEventsError::Parse(format!(
                "line {}: label {} is not an integer",
                line_no, label
            )));
        }
        labels.push(label as i64);
        trials.push(values[1..].to_vec());
    }

    if trials.is_empty() {
        return Err(SpectralEventsError::Parse(
            "No trial rows found".to_string(),
        ));
    }

    log::info!(
        "Parsed {} trials x {} samples",
        trials.len(),
        col_count - 1
    );

    Ok(LabelledRows { labels, trials })
}
