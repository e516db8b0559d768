//! Per-class accuracy report and its CSV sink.

use std::{fmt, fs::File, io, path::Path};

use segeval_metric::{ClassMetrics, ConfusionAccumulator, METRIC_NAMES};

use crate::error::{EvalError, EvalResult};

/// One report row: a class and the statistics of its merged confusion matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Row label, `class_<index>`.
    pub label: String,
    pub class: usize,
    pub confusion: ConfusionAccumulator,
    pub metrics: ClassMetrics,
}

impl ReportRow {
    pub fn new(class: usize, confusion: ConfusionAccumulator) -> Self {
        Self {
            label: format!("class_{class}"),
            class,
            confusion,
            metrics: confusion.metrics(),
        }
    }
}

/// The per-class report of an evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyReport {
    rows: Vec<ReportRow>,
}

impl AccuracyReport {
    pub const fn new(rows: Vec<ReportRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Looks a row up by its label, e.g. `"class_1"`.
    pub fn row(&self, label: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|row| row.label == label)
    }

    /// Writes the report as CSV: a header with the metric names, then one line
    /// per class in row order. Row labels are not written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `writer` fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> EvalResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        writer.write_record(METRIC_NAMES)?;
        for row in &self.rows {
            writer.serialize(row.metrics)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the CSV report to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> EvalResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| EvalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_csv(file)
    }
}

impl fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}", "")?;
        for name in ["IR", "OA", "Precision", "Recall", "FPR", "IoU", "F1", "TSS"] {
            write!(f, "{name:>11}")?;
        }
        for row in &self.rows {
            writeln!(f)?;
            write!(f, "{:<10}", row.label)?;
            for value in row.metrics.values() {
                write!(f, "{value:>11.5}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> AccuracyReport {
        AccuracyReport::new(vec![
            ReportRow::new(1, ConfusionAccumulator::from_counts(1, 1, 1, 1)),
            ReportRow::new(2, ConfusionAccumulator::from_counts(0, 0, 0, 4)),
        ])
    }

    #[test]
    fn rows_are_labelled_by_class() {
        let report = sample_report();

        assert_eq!(report.row("class_2").unwrap().class, 2);
        assert!(report.row("class_3").is_none());
    }

    #[test]
    fn csv_has_header_and_one_line_per_class() {
        let mut buffer = Vec::new();
        sample_report().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Imbalance Ratio,Overall Accuracy,Precision (UA or PPV),\
             Recall (PA or TPR or Sensitivity),False Positive Rate,IoU,F1-score,TSS"
        );
        assert!(lines[1].starts_with("1.0,0.5,0.5,0.5,0.5,"));
        assert!(!text.contains("class_"));
    }

    #[test]
    fn empty_class_writes_nan_tss() {
        let mut buffer = Vec::new();
        sample_report().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.lines().nth(2).unwrap().ends_with(",NaN"));
    }

    #[test]
    fn saves_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        sample_report().save_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), METRIC_NAMES.len());
        let rows: Vec<ClassMetrics> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].accuracy, 0.5);
    }

    #[test]
    fn display_has_one_line_per_row_plus_header() {
        let rendered = sample_report().to_string();

        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("class_1"));
    }
}
