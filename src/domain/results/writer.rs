use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::domain::results::records::{CsvRecord, RequestRecord, RunSummary};
use crate::error::Result;

/// File name of the per-run summary table inside the output directory.
pub const SUMMARY_FILE_NAME: &str = "summary.csv";

/// Appends `records` to the CSV file at `path`.
///
/// The header row is written only when the file did not exist or was empty,
/// so resuming a long benchmark against the same output never repeats it.
/// Returns the number of data rows written.
pub fn append_csv<R: CsvRecord>(path: &Path, records: &[R]) -> Result<usize> {
    let is_new = match fs::metadata(path) {
        Ok(metadata) => metadata.len() == 0,
        Err(_) => true,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut csv_wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    if is_new {
        csv_wtr.write_record(R::headers())?;
    }

    for record in records {
        csv_wtr.write_record(record.to_row())?;
    }

    csv_wtr.flush()?;
    Ok(records.len())
}

/// Destination for replay results. Persistence lives behind this trait so the
/// orchestrator never touches the file system directly.
pub trait ResultSink: Send {
    fn write_requests(&mut self, log_file_name: &str, records: &[RequestRecord]) -> Result<()>;
    fn write_summary(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Writes one request log per iteration and appends every summary to [`SUMMARY_FILE_NAME`].
#[derive(Debug, Clone)]
pub struct CsvResultSink {
    output_directory: PathBuf,
}

impl CsvResultSink {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        CsvResultSink { output_directory: output_directory.into() }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_directory.join(SUMMARY_FILE_NAME)
    }

    pub fn request_log_path(&self, log_file_name: &str) -> PathBuf {
        self.output_directory.join(log_file_name)
    }
}

impl ResultSink for CsvResultSink {
    fn write_requests(&mut self, log_file_name: &str, records: &[RequestRecord]) -> Result<()> {
        let path = self.request_log_path(log_file_name);
        let written = append_csv(&path, records)?;
        log::debug!("Wrote {} request records to '{}'.", written, path.display());
        Ok(())
    }

    fn write_summary(&mut self, summary: &RunSummary) -> Result<()> {
        append_csv(&self.summary_path(), std::slice::from_ref(summary))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(url: &str) -> RequestRecord {
        RequestRecord {
            hit_index: 0,
            url: url.to_string(),
            status_code: 200,
            header_duration: Duration::from_millis(1),
            body_duration: Duration::from_millis(2),
            started_at: Duration::ZERO,
            completed_at: Duration::from_millis(2),
            start_sequence: 0,
            completion_sequence: 1,
            error: None,
        }
    }

    fn header_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().filter(|l| l.starts_with("Url,")).count()
    }

    #[test]
    fn fresh_file_gets_exactly_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.csv");

        append_csv(&path, &[record("http://x/a"), record("http://x/b")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("Url,StatusCode,HeaderDurationMs,BodyDurationMs"));
        assert_eq!(content.lines().count(), 3);
        assert_eq!(header_count(&path), 1);
    }

    #[test]
    fn appending_to_existing_file_never_repeats_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.csv");

        append_csv(&path, &[record("http://x/a")]).unwrap();
        append_csv(&path, &[record("http://x/b")]).unwrap();
        append_csv::<RequestRecord>(&path, &[]).unwrap();

        assert_eq!(header_count(&path), 1);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn empty_write_to_fresh_path_still_emits_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("requests.csv");

        append_csv::<RequestRecord>(&path, &[]).unwrap();
        assert_eq!(header_count(&path), 1);
    }

    #[test]
    fn empty_existing_file_is_treated_as_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.csv");
        fs::write(&path, "").unwrap();

        append_csv(&path, &[record("http://x/a")]).unwrap();
        assert_eq!(header_count(&path), 1);
    }
}
