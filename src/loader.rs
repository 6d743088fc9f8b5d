use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use calamine::{Data, Reader, open_workbook_auto};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{Message, XlvError};
use crate::view::{Cell, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileType {
    Xlsx,
    Xls,
}

#[derive(Debug)]
pub struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// The decoded first sheet of a workbook: the ordered column names taken
/// from the header row, one `Row` per data row, and the display width of
/// each column in characters.
#[derive(Debug, Default)]
pub struct SheetTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub widths: Vec<usize>,
}

/// Decode the file on a background thread and deliver the outcome to the
/// event loop as a single message. Read-to-completion: no partial results,
/// no cancellation.
pub fn spawn_load(path: PathBuf, tx: Sender<Message>) {
    std::thread::spawn(move || {
        let result = get_file_info(path).and_then(|info| {
            debug!(
                "Loading {:?} ({} bytes, {:?})",
                info.path, info.file_size, info.file_type
            );
            load_table(&info)
        });
        let message = match result {
            Ok(table) => Message::Loaded(Box::new(table)),
            Err(e) => Message::LoadFailed(e),
        };
        if tx.send(message).is_err() {
            warn!("Loading finished after the event loop was gone");
        }
    });
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, XlvError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => XlvError::FileNotFound,
        ErrorKind::PermissionDenied => XlvError::PermissionDenied,
        _ => XlvError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(XlvError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

// Extension hint only, no content validation. Same gate as the usual
// file-picker "accept" list.
fn detect_file_type(path: &Path) -> Result<FileType, XlvError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("XLSX") => Ok(FileType::Xlsx),
        Some("XLS") => Ok(FileType::Xls),
        _ => Err(XlvError::UnknownFileType),
    }
}

fn load_table(info: &FileInfo) -> Result<SheetTable, XlvError> {
    let start_time = Instant::now();

    let mut workbook = open_workbook_auto(&info.path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| XlvError::LoadingFailed("Workbook has no sheets!".into()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut raw_rows = range.rows();
    let header = raw_rows
        .next()
        .ok_or_else(|| XlvError::LoadingFailed(format!("Sheet \"{sheet_name}\" is empty!")))?;

    // Column names are captured once, from the header row. Rows that follow
    // are keyed by these names; cells past the header width are dropped.
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| header_name(cell, idx))
        .collect();

    let rows: Vec<Row> = raw_rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.clone(), convert_cell(cells.get(idx))))
                .collect()
        })
        .collect();

    // Widths are independent per column, so measure them in parallel.
    let widths: Vec<usize> = columns
        .par_iter()
        .map(|name| {
            rows.iter()
                .map(|row| row.display(name).chars().count())
                .max()
                .unwrap_or(0)
                .max(name.chars().count())
        })
        .collect();

    info!(
        "Decoded sheet \"{}\": {} columns, {} rows in {}ms",
        sheet_name,
        columns.len(),
        rows.len(),
        start_time.elapsed().as_millis()
    );

    Ok(SheetTable {
        name: sheet_name,
        columns,
        rows,
        widths,
    })
}

fn header_name(cell: &Data, idx: usize) -> String {
    let name = cell.to_string();
    if name.is_empty() {
        format!("Column {}", idx + 1)
    } else {
        name
    }
}

fn convert_cell(data: Option<&Data>) -> Cell {
    match data {
        None | Some(Data::Empty) => Cell::Empty,
        Some(Data::String(s)) => Cell::Text(s.clone()),
        Some(Data::Float(f)) => Cell::Number(*f),
        Some(Data::Int(i)) => Cell::Number(*i as f64),
        Some(Data::Bool(b)) => Cell::Text(b.to_string()),
        Some(Data::DateTime(dt)) => Cell::Number(dt.as_f64()),
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => Cell::Text(s.clone()),
        Some(Data::Error(e)) => Cell::Text(e.to_string()),
    }
}
