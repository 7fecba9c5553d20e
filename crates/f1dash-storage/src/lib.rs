//! Parquet table store for the dashboard tables, with synthetic fallback.

pub mod synthetic;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, ArrayRef, Date32Array, Date64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
};
use arrow_schema::{ArrowError, DataType, Field as ArrowField, Schema};
use chrono::NaiveDate;
use f1dash_core::{
    ApplicationSource, CategoryCount, DailyJobPostings, DashboardConfig, Mistake, MistakeType,
    StateJobPostings, StatePetitions,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::errors::ParquetError;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "f1dash-storage";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parquet error on {path}: {source}")]
    Parquet { path: PathBuf, source: ParquetError },
    #[error("arrow error on {path}: {source}")]
    Arrow { path: PathBuf, source: ArrowError },
    #[error("{path}: column {column} is missing or has an unexpected type")]
    Column { path: PathBuf, column: &'static str },
    #[error("{path}: unparseable date {value:?}")]
    Date { path: PathBuf, value: String },
    #[error("{path}: column {column} row {row} is null or out of range")]
    Value {
        path: PathBuf,
        column: &'static str,
        row: usize,
    },
}

/// Outcome of one whole-table write.
#[derive(Debug, Clone)]
pub struct StoredTable {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// File locations of every persisted table inside the data directory.
#[derive(Debug, Clone)]
pub struct TablePaths {
    pub state_petitions: PathBuf,
    pub state_job_postings: PathBuf,
    pub daily_job_postings: PathBuf,
    pub mistakes: PathBuf,
    pub mistakes_by_type: PathBuf,
    pub manifest: PathBuf,
}

impl TablePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            state_petitions: dir.join("h1b_by_state.parquet"),
            state_job_postings: dir.join("job_postings_by_state.parquet"),
            daily_job_postings: dir.join("job_postings_daily.parquet"),
            mistakes: dir.join("job_application_mistakes.parquet"),
            mistakes_by_type: dir.join("mistakes_by_type.parquet"),
            manifest: dir.join("manifest.json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
    paths: TablePaths,
    seed: u64,
    anchor: Option<NaiveDate>,
}

impl TableStore {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            paths: TablePaths::in_dir(&config.data_dir),
            seed: config.synthetic_seed,
            anchor: config.synthetic_anchor,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &TablePaths {
        &self.paths
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Last day covered by synthetic tables.
    pub fn anchor_date(&self) -> NaiveDate {
        self.anchor
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    pub fn load_state_petitions(&self) -> Vec<StatePetitions> {
        load_or_synthesize("h1b_by_state", self.read_state_petitions(), || {
            synthetic::state_petitions(self.seed)
        })
    }

    pub fn load_state_job_postings(&self) -> Vec<StateJobPostings> {
        load_or_synthesize("job_postings_by_state", self.read_state_job_postings(), || {
            synthetic::state_job_postings(self.seed, self.anchor_date())
        })
    }

    pub fn load_daily_job_postings(&self) -> Vec<DailyJobPostings> {
        load_or_synthesize("job_postings_daily", self.read_daily_job_postings(), || {
            synthetic::daily_job_postings(self.seed, self.anchor_date())
        })
    }

    pub fn load_mistakes(&self) -> Vec<Mistake> {
        load_or_synthesize("job_application_mistakes", self.read_mistakes(), || {
            synthetic::mistakes(self.seed, self.anchor_date())
        })
    }

    pub fn read_state_petitions(&self) -> Result<Option<Vec<StatePetitions>>, StorageError> {
        let path = &self.paths.state_petitions;
        let Some(batches) = read_batches(path)? else {
            return Ok(None);
        };
        let mut rows = Vec::new();
        for batch in &batches {
            let states = string_column(path, batch, "state")?;
            let petitions = int_column(path, batch, "petitions")?;
            // Older exports name the period column `fy`.
            let (year_column, fiscal_years) = match int_column(path, batch, "fiscal_year") {
                Ok(array) => ("fiscal_year", array),
                Err(_) => ("fy", int_column(path, batch, "fy")?),
            };
            for i in 0..batch.num_rows() {
                let fiscal_year = (!fiscal_years.is_null(i))
                    .then(|| i32::try_from(fiscal_years.value(i)).ok())
                    .flatten()
                    .ok_or_else(|| StorageError::Value {
                        path: path.to_path_buf(),
                        column: year_column,
                        row: i,
                    })?;
                rows.push(StatePetitions {
                    state: states.value(i).trim().to_ascii_uppercase(),
                    petitions: count_at(petitions, i),
                    fiscal_year,
                });
            }
        }
        Ok(Some(rows))
    }

    pub fn read_state_job_postings(&self) -> Result<Option<Vec<StateJobPostings>>, StorageError> {
        let path = &self.paths.state_job_postings;
        let Some(batches) = read_batches(path)? else {
            return Ok(None);
        };
        let mut rows = Vec::new();
        for batch in &batches {
            let states = string_column(path, batch, "state")?;
            let job_counts = int_column(path, batch, "job_count")?;
            let dates = DateColumn::from_batch(path, batch, "date")?;
            for i in 0..batch.num_rows() {
                rows.push(StateJobPostings {
                    state: states.value(i).trim().to_ascii_uppercase(),
                    job_count: count_at(job_counts, i),
                    date: dates.value(path, i)?,
                });
            }
        }
        Ok(Some(rows))
    }

    pub fn read_daily_job_postings(&self) -> Result<Option<Vec<DailyJobPostings>>, StorageError> {
        let path = &self.paths.daily_job_postings;
        let Some(batches) = read_batches(path)? else {
            return Ok(None);
        };
        let mut rows = Vec::new();
        for batch in &batches {
            let dates = DateColumn::from_batch(path, batch, "date")?;
            let totals = int_column(path, batch, "total_postings")?;
            for i in 0..batch.num_rows() {
                rows.push(DailyJobPostings {
                    date: dates.value(path, i)?,
                    total_postings: count_at(totals, i),
                });
            }
        }
        Ok(Some(rows))
    }

    pub fn read_mistakes(&self) -> Result<Option<Vec<Mistake>>, StorageError> {
        let path = &self.paths.mistakes;
        let Some(batches) = read_batches(path)? else {
            return Ok(None);
        };
        let mut rows = Vec::new();
        for batch in &batches {
            let ids = int_column(path, batch, "id")?;
            let dates = DateColumn::from_batch(path, batch, "date")?;
            let companies = string_column(path, batch, "company")?;
            let titles = string_column(path, batch, "job_title")?;
            let sources = string_column(path, batch, "source")?;
            let types = string_column(path, batch, "mistake_type")?;
            let intended = string_column(path, batch, "intended_url")?;
            let actual = string_column(path, batch, "actual_url")?;
            for i in 0..batch.num_rows() {
                rows.push(Mistake {
                    id: count_at(ids, i),
                    date: dates.value(path, i)?,
                    company: companies.value(i).to_string(),
                    job_title: titles.value(i).to_string(),
                    source: ApplicationSource::from_label(sources.value(i)),
                    mistake_type: MistakeType::from_label(types.value(i)),
                    intended_url: intended.value(i).to_string(),
                    actual_url: actual.value(i).to_string(),
                });
            }
        }
        Ok(Some(rows))
    }

    pub fn write_state_petitions(&self, rows: &[StatePetitions]) -> Result<StoredTable, StorageError> {
        let schema = Arc::new(Schema::new(vec![
            ArrowField::new("state", DataType::Utf8, false),
            ArrowField::new("petitions", DataType::Int64, false),
            ArrowField::new("fiscal_year", DataType::Int64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.state.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.petitions as i64))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.fiscal_year as i64))),
        ];
        self.write_table(&self.paths.state_petitions, schema, columns, rows.len())
    }

    pub fn write_state_job_postings(
        &self,
        rows: &[StateJobPostings],
    ) -> Result<StoredTable, StorageError> {
        let schema = Arc::new(Schema::new(vec![
            ArrowField::new("state", DataType::Utf8, false),
            ArrowField::new("job_count", DataType::Int64, false),
            ArrowField::new("date", DataType::Utf8, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.state.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.job_count as i64))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| format_date(r.date)))),
        ];
        self.write_table(&self.paths.state_job_postings, schema, columns, rows.len())
    }

    pub fn write_daily_job_postings(
        &self,
        rows: &[DailyJobPostings],
    ) -> Result<StoredTable, StorageError> {
        let schema = Arc::new(Schema::new(vec![
            ArrowField::new("date", DataType::Utf8, false),
            ArrowField::new("total_postings", DataType::Int64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| format_date(r.date)))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.total_postings as i64))),
        ];
        self.write_table(&self.paths.daily_job_postings, schema, columns, rows.len())
    }

    pub fn write_mistakes(&self, rows: &[Mistake]) -> Result<StoredTable, StorageError> {
        let schema = Arc::new(Schema::new(vec![
            ArrowField::new("id", DataType::Int64, false),
            ArrowField::new("date", DataType::Utf8, false),
            ArrowField::new("company", DataType::Utf8, false),
            ArrowField::new("job_title", DataType::Utf8, false),
            ArrowField::new("source", DataType::Utf8, false),
            ArrowField::new("mistake_type", DataType::Utf8, false),
            ArrowField::new("intended_url", DataType::Utf8, false),
            ArrowField::new("actual_url", DataType::Utf8, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id as i64))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| format_date(r.date)))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.company.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.job_title.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.source.label()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.mistake_type.label()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.intended_url.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.actual_url.as_str()))),
        ];
        self.write_table(&self.paths.mistakes, schema, columns, rows.len())
    }

    pub fn write_mistakes_by_type(&self, rows: &[CategoryCount]) -> Result<StoredTable, StorageError> {
        let schema = Arc::new(Schema::new(vec![
            ArrowField::new("mistake_type", DataType::Utf8, false),
            ArrowField::new("count", DataType::Int64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.label.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.count as i64))),
        ];
        self.write_table(&self.paths.mistakes_by_type, schema, columns, rows.len())
    }

    fn write_table(
        &self,
        path: &Path,
        schema: Arc<Schema>,
        columns: Vec<ArrayRef>,
        rows: usize,
    ) -> Result<StoredTable, StorageError> {
        let batch = RecordBatch::try_new(schema, columns).map_err(|source| StorageError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = encode_parquet(path, &batch)?;
        replace_atomically(path, &bytes)?;
        debug!(path = %path.display(), rows, bytes = bytes.len(), "wrote table");
        Ok(StoredTable {
            path: path.to_path_buf(),
            rows,
            bytes: bytes.len() as u64,
            sha256: Self::sha256_hex(&bytes),
        })
    }
}

fn load_or_synthesize<T>(
    table: &'static str,
    read: Result<Option<Vec<T>>, StorageError>,
    synthesize: impl FnOnce() -> Vec<T>,
) -> Vec<T> {
    match read {
        Ok(Some(rows)) => rows,
        Ok(None) => {
            debug!(table, "no persisted table; using synthetic data");
            synthesize()
        }
        Err(err) => {
            warn!(table, error = %err, "persisted table unreadable; using synthetic data");
            synthesize()
        }
    }
}

fn encode_parquet(path: &Path, batch: &RecordBatch) -> Result<Vec<u8>, StorageError> {
    let parquet_err = |source| StorageError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let mut buffer = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buffer, batch.schema(), None).map_err(parquet_err)?;
    writer.write(batch).map_err(parquet_err)?;
    writer.close().map_err(parquet_err)?;
    Ok(buffer)
}

/// Replace `path` with `bytes` through a temp file and rename, so readers see
/// either the old table or the new one.
pub fn replace_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| StorageError::Io { path, source }
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_err(parent))?;

    let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
    let written = File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(io_err(temp_path.as_path()));
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source: err,
        });
    }
    Ok(())
}

fn read_batches(path: &Path) -> Result<Option<Vec<RecordBatch>>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let parquet_err = |source| StorageError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(parquet_err)?
        .build()
        .map_err(parquet_err)?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| StorageError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(batches))
}

fn string_column<'a>(
    path: &Path,
    batch: &'a RecordBatch,
    column: &'static str,
) -> Result<&'a StringArray, StorageError> {
    batch
        .column_by_name(column)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StorageError::Column {
            path: path.to_path_buf(),
            column,
        })
}

fn int_column<'a>(
    path: &Path,
    batch: &'a RecordBatch,
    column: &'static str,
) -> Result<&'a Int64Array, StorageError> {
    batch
        .column_by_name(column)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| StorageError::Column {
            path: path.to_path_buf(),
            column,
        })
}

/// Counts are non-negative; nulls and negatives read as zero.
fn count_at(array: &Int64Array, i: usize) -> u64 {
    if array.is_null(i) {
        0
    } else {
        array.value(i).max(0) as u64
    }
}

/// Date columns as written by this crate (`Utf8`, `Date32`) or by dataframe
/// exports (`Date64`, zone-less or UTC timestamps).
enum DateColumn<'a> {
    Text(&'a StringArray),
    Days(&'a Date32Array),
    Millis(&'a Date64Array),
    TimestampMillis(&'a TimestampMillisecondArray),
    TimestampMicros(&'a TimestampMicrosecondArray),
    TimestampNanos(&'a TimestampNanosecondArray),
}

impl<'a> DateColumn<'a> {
    fn from_batch(
        path: &Path,
        batch: &'a RecordBatch,
        column: &'static str,
    ) -> Result<Self, StorageError> {
        let array = batch.column_by_name(column).ok_or_else(|| StorageError::Column {
            path: path.to_path_buf(),
            column,
        })?;
        let any = array.as_any();
        let date_column = if let Some(a) = any.downcast_ref::<StringArray>() {
            DateColumn::Text(a)
        } else if let Some(a) = any.downcast_ref::<Date32Array>() {
            DateColumn::Days(a)
        } else if let Some(a) = any.downcast_ref::<Date64Array>() {
            DateColumn::Millis(a)
        } else if let Some(a) = any.downcast_ref::<TimestampMillisecondArray>() {
            DateColumn::TimestampMillis(a)
        } else if let Some(a) = any.downcast_ref::<TimestampMicrosecondArray>() {
            DateColumn::TimestampMicros(a)
        } else if let Some(a) = any.downcast_ref::<TimestampNanosecondArray>() {
            DateColumn::TimestampNanos(a)
        } else {
            return Err(StorageError::Column {
                path: path.to_path_buf(),
                column,
            });
        };
        Ok(date_column)
    }

    fn array(&self) -> &dyn Array {
        match self {
            DateColumn::Text(a) => *a as &dyn Array,
            DateColumn::Days(a) => *a,
            DateColumn::Millis(a) => *a,
            DateColumn::TimestampMillis(a) => *a,
            DateColumn::TimestampMicros(a) => *a,
            DateColumn::TimestampNanos(a) => *a,
        }
    }

    fn value(&self, path: &Path, i: usize) -> Result<NaiveDate, StorageError> {
        let parsed = if self.array().is_null(i) {
            None
        } else {
            match self {
                DateColumn::Text(array) => {
                    let raw = array.value(i);
                    // Accept full timestamps by keeping the date part.
                    let day = raw.get(..10).unwrap_or(raw);
                    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
                }
                DateColumn::Days(array) => array.value_as_date(i),
                DateColumn::Millis(array) => array.value_as_date(i),
                DateColumn::TimestampMillis(array) => array.value_as_datetime(i).map(|t| t.date()),
                DateColumn::TimestampMicros(array) => array.value_as_datetime(i).map(|t| t.date()),
                DateColumn::TimestampNanos(array) => array.value_as_datetime(i).map(|t| t.date()),
            }
        };
        parsed.ok_or_else(|| StorageError::Date {
            path: path.to_path_buf(),
            value: self.raw_value(i),
        })
    }

    fn raw_value(&self, i: usize) -> String {
        if self.array().is_null(i) {
            return "null".to_string();
        }
        match self {
            DateColumn::Text(array) => array.value(i).to_string(),
            DateColumn::Days(array) => array.value(i).to_string(),
            DateColumn::Millis(array) => array.value(i).to_string(),
            DateColumn::TimestampMillis(array) => array.value(i).to_string(),
            DateColumn::TimestampMicros(array) => array.value(i).to_string(),
            DateColumn::TimestampNanos(array) => array.value(i).to_string(),
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> TableStore {
        let mut config = DashboardConfig::with_data_dir(dir);
        config.synthetic_anchor = NaiveDate::from_ymd_opt(2025, 6, 30);
        TableStore::new(&config)
    }

    #[test]
    fn artifact_hashing_is_stable() {
        let hash = TableStore::sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn missing_tables_fall_back_to_synthetic_domains() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let petitions = store.load_state_petitions();
        let postings = store.load_state_job_postings();
        let daily = store.load_daily_job_postings();
        let mistakes = store.load_mistakes();

        assert_eq!(petitions.len(), 51);
        assert_eq!(postings.len(), 51);
        assert_eq!(daily.len(), 90);
        assert_eq!(mistakes.len(), 500);
        assert!(petitions.iter().all(|p| f1dash_core::is_known_state(&p.state)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn written_tables_read_back_unchanged() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let anchor = store.anchor_date();

        let petitions = synthetic::state_petitions(3);
        let postings = synthetic::state_job_postings(3, anchor);
        let daily = synthetic::daily_job_postings(3, anchor);
        let mistakes = synthetic::mistakes(3, anchor);

        let stored = store.write_state_petitions(&petitions).expect("petitions");
        assert_eq!(stored.rows, 51);
        assert_eq!(stored.sha256.len(), 64);
        store.write_state_job_postings(&postings).expect("postings");
        store.write_daily_job_postings(&daily).expect("daily");
        store.write_mistakes(&mistakes).expect("mistakes");

        assert_eq!(store.read_state_petitions().unwrap(), Some(petitions));
        assert_eq!(store.read_state_job_postings().unwrap(), Some(postings));
        assert_eq!(store.read_daily_job_postings().unwrap(), Some(daily));
        assert_eq!(store.load_mistakes(), mistakes);
    }

    #[test]
    fn atomic_replace_leaves_no_temp_files() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let anchor = store.anchor_date();
        store
            .write_daily_job_postings(&synthetic::daily_job_postings(1, anchor))
            .unwrap();
        store
            .write_daily_job_postings(&synthetic::daily_job_postings(2, anchor))
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["job_postings_daily.parquet".to_string()]);
        assert_eq!(
            store.load_daily_job_postings(),
            synthetic::daily_job_postings(2, anchor)
        );
    }

    #[test]
    fn corrupt_table_is_an_error_for_strict_reads_only() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        std::fs::write(&store.paths().mistakes, b"not parquet").unwrap();

        assert!(store.read_mistakes().is_err());
        assert_eq!(store.load_mistakes().len(), 500);
    }

    #[test]
    fn wrong_schema_reports_missing_column() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        // A daily-postings file placed where the by-state table belongs.
        let bytes = {
            let other = store_in(dir.path());
            other
                .write_daily_job_postings(&synthetic::daily_job_postings(1, other.anchor_date()))
                .unwrap();
            std::fs::read(&other.paths().daily_job_postings).unwrap()
        };
        replace_atomically(&store.paths().state_job_postings, &bytes).unwrap();

        match store.read_state_job_postings() {
            Err(StorageError::Column { column, .. }) => assert_eq!(column, "state"),
            other => panic!("expected column error, got {other:?}"),
        }
    }

    fn write_batch(path: &Path, columns: Vec<(&str, ArrayRef)>) {
        let batch = RecordBatch::try_from_iter(columns).unwrap();
        replace_atomically(path, &encode_parquet(path, &batch).unwrap()).unwrap();
    }

    #[test]
    fn dataframe_timestamp_dates_read_as_utc_days() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        // 2025-06-30T15:00:00Z
        let nanos = 1_751_295_600_000_000_000_i64;
        write_batch(
            &store.paths().state_job_postings,
            vec![
                ("state", Arc::new(StringArray::from(vec!["ca"])) as ArrayRef),
                ("job_count", Arc::new(Int64Array::from(vec![1200])) as ArrayRef),
                (
                    "date",
                    Arc::new(TimestampNanosecondArray::from(vec![nanos])) as ArrayRef,
                ),
            ],
        );
        write_batch(
            &store.paths().daily_job_postings,
            vec![
                (
                    "date",
                    Arc::new(TimestampMicrosecondArray::from(vec![nanos / 1_000]).with_timezone("UTC"))
                        as ArrayRef,
                ),
                ("total_postings", Arc::new(Int64Array::from(vec![640])) as ArrayRef),
            ],
        );

        let june_30 = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let postings = store.load_state_job_postings();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].state, "CA");
        assert_eq!(postings[0].job_count, 1200);
        assert_eq!(postings[0].date, june_30);
        let daily = store.read_daily_job_postings().unwrap().unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].date, june_30);
        assert_eq!(daily[0].total_postings, 640);
    }

    #[test]
    fn fiscal_year_must_fit_and_be_present() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let path = store.paths().state_petitions.clone();
        let write_years = |years: Vec<Option<i64>>| {
            let states = vec!["TX"; years.len()];
            let petitions = vec![10_i64; years.len()];
            write_batch(
                &path,
                vec![
                    ("state", Arc::new(StringArray::from(states)) as ArrayRef),
                    ("petitions", Arc::new(Int64Array::from(petitions)) as ArrayRef),
                    ("fy", Arc::new(Int64Array::from(years)) as ArrayRef),
                ],
            );
        };

        write_years(vec![Some(2024)]);
        assert_eq!(store.read_state_petitions().unwrap().unwrap()[0].fiscal_year, 2024);

        write_years(vec![Some(2024), Some(i64::from(i32::MAX) + 1)]);
        match store.read_state_petitions() {
            Err(StorageError::Value { column, row, .. }) => {
                assert_eq!(column, "fy");
                assert_eq!(row, 1);
            }
            other => panic!("expected value error, got {other:?}"),
        }

        write_years(vec![None]);
        assert!(matches!(
            store.read_state_petitions(),
            Err(StorageError::Value { row: 0, .. })
        ));
        assert_eq!(store.load_state_petitions().len(), 51);
    }
}
