use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use polars::prelude::{CsvReader, DataFrame, ParquetReader, SerReader};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{ColumnNotFound, LoadError};
use crate::models::{DataFormat, Dataset};

/// Extension-based format guess. `None` means "unknown, try delimited text".
pub fn detect_format(path: &Path) -> Option<DataFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "tsv" => Some(DataFormat::Csv),
        "parquet" => Some(DataFormat::Parquet),
        _ => None,
    }
}

/// Picks the candidate that splits the header into the most columns.
/// Earlier candidates win ties, so a header without any candidate
/// falls back to the first one.
pub fn detect_delimiter(header: &str, candidates: &[char]) -> char {
    let mut best = candidates.first().copied().unwrap_or(',');
    let mut best_columns = 0;
    for &candidate in candidates {
        let columns = header.split(candidate).count();
        if columns > best_columns {
            best = candidate;
            best_columns = columns;
        }
    }
    best
}

/// Case-sensitive exact match; the error lists every real column.
pub fn validate_column_exists(dataset: &Dataset, name: &str) -> Result<(), ColumnNotFound> {
    if dataset.columns.iter().any(|c| c.name == name) {
        Ok(())
    } else {
        Err(ColumnNotFound {
            requested: name.to_string(),
            available: dataset.column_names(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatasetLoader {
    config: AnalysisConfig,
}

impl DatasetLoader {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn load(
        &self,
        path: &Path,
        requested_delimiter: Option<char>,
    ) -> Result<Dataset, LoadError> {
        let start = std::time::Instant::now();
        let detected = detect_format(path);
        // Unknown extensions are attempted as delimited text.
        let format = detected.unwrap_or(DataFormat::Csv);
        info!("Loading dataset {} as {}", path.display(), format);

        if !path.is_file() {
            warn!("Dataset {} does not exist", path.display());
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
                format,
            });
        }

        let (frame, delimiter) = match format {
            DataFormat::Parquet => (self.read_parquet(path)?, None),
            DataFormat::Csv => {
                let (frame, delimiter) =
                    self.read_delimited(path, requested_delimiter, detected.is_none())?;
                (frame, Some(delimiter))
            }
        };

        if frame.width() == 0 || frame.height() == 0 {
            warn!(
                "Dataset {} is empty ({} rows x {} columns)",
                path.display(),
                frame.height(),
                frame.width()
            );
            return Err(LoadError::EmptyDataset {
                path: path.to_path_buf(),
                format,
            });
        }

        info!(
            "Loaded {} rows x {} columns from {} in {:?}",
            frame.height(),
            frame.width(),
            path.display(),
            start.elapsed()
        );
        Ok(Dataset::new(path.to_path_buf(), format, delimiter, frame))
    }

    fn read_parquet(&self, path: &Path) -> Result<DataFrame, LoadError> {
        let file = File::open(path).map_err(|e| io_error(path, DataFormat::Parquet, e))?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| unsupported(path, DataFormat::Parquet, e.to_string()))
    }

    fn read_delimited(
        &self,
        path: &Path,
        requested: Option<char>,
        fallback: bool,
    ) -> Result<(DataFrame, char), LoadError> {
        let header = match read_header_line(path)? {
            Some((header, true)) => header,
            _ => {
                return Err(LoadError::EmptyDataset {
                    path: path.to_path_buf(),
                    format: DataFormat::Csv,
                })
            }
        };

        let delimiter = match requested {
            Some(delimiter) => delimiter,
            None if is_tsv(path) => '\t',
            None => detect_delimiter(&header, &self.config.delimiters_to_try),
        };
        debug!("Using delimiter {:?} for {}", delimiter, path.display());

        if !delimiter.is_ascii() {
            return Err(unsupported(
                path,
                DataFormat::Csv,
                format!("delimiter {:?} is not a single-byte character", delimiter),
            ));
        }

        let frame = CsvReader::from_path(path)
            .and_then(|reader| {
                reader
                    .has_header(true)
                    .with_separator(delimiter as u8)
                    .infer_schema(None)
                    .finish()
            })
            .map_err(|e| {
                if fallback {
                    warn!("Fallback delimited read of {} failed: {}", path.display(), e);
                }
                unsupported(path, DataFormat::Csv, e.to_string())
            })?;

        Ok((frame, delimiter))
    }
}

/// First non-empty line with any byte-order mark stripped, and whether any
/// data line follows it. Invalid UTF-8 is rejected here rather than by the
/// CSV reader.
fn read_header_line(path: &Path) -> Result<Option<(String, bool)>, LoadError> {
    let file = File::open(path).map_err(|e| io_error(path, DataFormat::Csv, e))?;
    let mut header = None;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| unsupported(path, DataFormat::Csv, e.to_string()))?;
        let line = line.trim_start_matches('\u{feff}').trim_end();
        if line.is_empty() {
            continue;
        }
        if header.is_some() {
            return Ok(header.map(|h| (h, true)));
        }
        header = Some(line.to_string());
    }
    Ok(header.map(|h| (h, false)))
}

fn is_tsv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("tsv"))
}

fn io_error(path: &Path, format: DataFormat, err: std::io::Error) -> LoadError {
    if err.kind() == std::io::ErrorKind::NotFound {
        LoadError::NotFound {
            path: PathBuf::from(path),
            format,
        }
    } else {
        unsupported(path, format, err.to_string())
    }
}

fn unsupported(path: &Path, format: DataFormat, reason: String) -> LoadError {
    LoadError::UnsupportedFormat {
        path: PathBuf::from(path),
        format,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, ParquetWriter, Series};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn loader() -> DatasetLoader {
        DatasetLoader::new(AnalysisConfig::default())
    }

    #[test]
    fn test_detect_delimiter_prefers_widest_split() {
        let candidates = [',', ';'];
        assert_eq!(detect_delimiter("a;b;c", &candidates), ';');
        assert_eq!(detect_delimiter("a,b,c", &candidates), ',');
        assert_eq!(detect_delimiter("a,b;c", &candidates), ',');
        assert_eq!(detect_delimiter("single", &candidates), ',');
        assert_eq!(detect_delimiter("x;y", &[]), ',');
    }

    #[test]
    fn test_detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("data.CSV")), Some(DataFormat::Csv));
        assert_eq!(detect_format(Path::new("data.tsv")), Some(DataFormat::Csv));
        assert_eq!(detect_format(Path::new("data.parquet")), Some(DataFormat::Parquet));
        assert_eq!(detect_format(Path::new("data.txt")), None);
        assert_eq!(detect_format(Path::new("data")), None);
    }

    #[test]
    fn test_semicolon_file_detected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "semi.csv", b"a;b;c\n1;2;3\n");

        let dataset = loader().load(&path, None).unwrap();
        assert_eq!(dataset.delimiter, Some(';'));
        assert_eq!(dataset.column_count(), 3);
        assert_eq!(dataset.column_names(), vec!["a", "b", "c"]);
        assert_eq!(dataset.row_count(), 1);
    }

    #[test]
    fn test_explicit_delimiter_wins() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pipes.csv", b"a|b\n1|2\n3|4\n");

        let dataset = loader().load(&path, Some('|')).unwrap();
        assert_eq!(dataset.delimiter, Some('|'));
        assert_eq!(dataset.column_count(), 2);
        assert_eq!(dataset.row_count(), 2);
    }

    #[test]
    fn test_single_column_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "one.csv", b"name\nalice\nbob\n");

        let dataset = loader().load(&path, None).unwrap();
        assert_eq!(dataset.column_count(), 1);
        assert_eq!(dataset.row_count(), 2);
    }

    #[test]
    fn test_tsv_uses_tab() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "data.tsv", b"a\tb\n1\t2\n");

        let dataset = loader().load(&path, None).unwrap();
        assert_eq!(dataset.delimiter, Some('\t'));
        assert_eq!(dataset.column_count(), 2);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_delimited() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "data.txt", b"x;y\n1;2\n");

        let dataset = loader().load(&path, None).unwrap();
        assert_eq!(dataset.format, DataFormat::Csv);
        assert_eq!(dataset.column_count(), 2);
    }

    #[test]
    fn test_binary_with_unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "blob.bin", &[0xff, 0xfe, 0x00, 0x9f, 0x92, 0x96, 0x0a, 0xc3, 0x28]);

        let err = loader().load(&path, None).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }), "{err:?}");
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = loader().load(Path::new("missing.csv"), None).unwrap_err();
        assert_eq!(
            err,
            LoadError::NotFound {
                path: PathBuf::from("missing.csv"),
                format: DataFormat::Csv,
            }
        );
    }

    #[test]
    fn test_header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let header_only = write(&dir, "header.csv", b"a;b;c\n");
        let blank = write(&dir, "blank.csv", b"");

        assert!(matches!(
            loader().load(&header_only, None),
            Err(LoadError::EmptyDataset { .. })
        ));
        assert!(matches!(
            loader().load(&blank, None),
            Err(LoadError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn test_parquet_roundtrip_preserves_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.parquet");
        let mut frame = DataFrame::new(vec![
            Series::new("SEX", &["M", "F", "M"]),
            Series::new("AGE", &[31i64, 45, 27]),
        ])
        .unwrap();
        let mut file = File::create(&path).unwrap();
        ParquetWriter::new(&mut file).finish(&mut frame).unwrap();

        let dataset = loader().load(&path, None).unwrap();
        assert_eq!(dataset.format, DataFormat::Parquet);
        assert_eq!(dataset.delimiter, None);
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_names(), vec!["SEX", "AGE"]);
    }

    #[test]
    fn test_loading_twice_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "twice.csv", b"a;b\n1;x\n2;y\n");

        let first = loader().load(&path, None).unwrap();
        let second = loader().load(&path, None).unwrap();
        assert_eq!(first.row_count(), second.row_count());
        assert_eq!(first.columns, second.columns);
    }

    #[test]
    fn test_validate_column_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "cols.csv", b"SEX;AGE\nM;3\n");
        let dataset = loader().load(&path, None).unwrap();

        assert!(validate_column_exists(&dataset, "SEX").is_ok());
        let err = validate_column_exists(&dataset, "sex").unwrap_err();
        assert_eq!(err.requested, "sex");
        assert_eq!(err.available, vec!["SEX", "AGE"]);
    }
}
