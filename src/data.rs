use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::NexusError;
use crate::engine::Column as ViewColumn;
use crate::record::{MapRecord, Record, Value};

#[derive(Debug)]
enum FileType {
    Csv,
    Parquet,
    Arrow,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A fully materialized export: the record snapshot handed to the view
/// engine, plus the field names in file order.
#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    pub fields: Vec<String>,
    pub records: Vec<MapRecord>,
}

impl Dataset {
    /// Default columns: every field becomes a sortable raw-field column,
    /// plus a derived "Filled" column showing how many fields of the record
    /// are populated. The derived column is display-only; it takes no part
    /// in search or sort.
    pub fn default_columns(&self) -> Vec<ViewColumn<MapRecord>> {
        let mut columns: Vec<ViewColumn<MapRecord>> = self
            .fields
            .iter()
            .map(|f| ViewColumn::field(f, f).sortable())
            .collect();
        let fields = self.fields.clone();
        columns.push(ViewColumn::derived("Filled", move |r: &MapRecord| {
            let filled = fields
                .iter()
                .filter(|f| matches!(r.get(f), Some(v) if *v != Value::Null))
                .count();
            format!("{}/{}", filled, fields.len())
        }));
        columns
    }
}

/// Load an export file into a `Dataset`. This is the data-source side of
/// the viewer; the engine itself never touches a file.
pub fn load(path: &Path) -> Result<Dataset, NexusError> {
    let info = file_info(path.to_path_buf())?;
    debug!("Loading {:?} ({} bytes)", info.path, info.file_size);
    let frame = match info.file_type {
        FileType::Csv => load_csv(&info.path)?,
        FileType::Parquet => load_parquet(&info.path)?,
        FileType::Arrow => load_arrow(&info.path)?,
    };

    let start_time = Instant::now();
    let df = frame.collect()?;
    let fields: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    // One conversion task per column, in parallel.
    let converted: Result<Vec<Vec<Value>>, PolarsError> = fields
        .par_iter()
        .map(|name| column_values(&df, name))
        .collect();
    let converted = converted?;

    let records: Vec<MapRecord> = (0..df.height())
        .map(|ridx| {
            fields
                .iter()
                .enumerate()
                .map(|(cidx, field)| (field.clone(), converted[cidx][ridx].clone()))
                .collect()
        })
        .collect();

    info!(
        "Loaded {} records with {} fields in {}ms",
        records.len(),
        fields.len(),
        start_time.elapsed().as_millis()
    );

    let name = info
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();

    Ok(Dataset {
        name,
        fields,
        records,
    })
}

fn file_info(path: PathBuf) -> Result<FileInfo, NexusError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => NexusError::FileNotFound,
        ErrorKind::PermissionDenied => NexusError::PermissionDenied,
        _ => NexusError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(NexusError::LoadingFailed("Not a file!".into()));
    }
    let file_type = detect_file_type(&path)?;
    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, NexusError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::Csv),
        Some("PARQUET") | Some("PQ") => Ok(FileType::Parquet),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::Arrow),
        _ => Err(NexusError::UnknownFileType),
    }
}

fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.as_path().into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(
        PlPath::Local(path.as_path().into()),
        ScanArgsParquet::default(),
    )
}

fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.as_path().into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

fn is_integer_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn is_float_type(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

// Columns keep their dtype as typed values so the engine sorts numbers
// numerically. Anything exotic (dates, categoricals) is rendered through a
// string cast.
fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(name)?;
    let values: Vec<Value> = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.map(|s| Value::Str(clean_text(s))).unwrap_or(Value::Null))
            .collect(),
        DataType::Boolean => column
            .bool()?
            .into_iter()
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
            .collect(),
        dt if is_integer_type(dt) => {
            let cast = column.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(Value::Int).unwrap_or(Value::Null))
                .collect()
        }
        dt if is_float_type(dt) => {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(Value::Float).unwrap_or(Value::Null))
                .collect()
        }
        _ => {
            let cast = column.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| Value::Str(clean_text(s))).unwrap_or(Value::Null))
                .collect()
        }
    };
    Ok(values)
}

fn clean_text(s: &str) -> String {
    s.replace("\r\n", " ↵ ").replace("\n", " ↵ ")
}
