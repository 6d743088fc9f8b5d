use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::loader::SheetTable;

#[derive(Debug)]
pub enum XlvError {
    IoError(Error),
    SpreadsheetError(calamine::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for XlvError {
    fn from(err: Error) -> Self {
        XlvError::IoError(err)
    }
}

impl From<calamine::Error> for XlvError {
    fn from(err: calamine::Error) -> Self {
        XlvError::SpreadsheetError(err)
    }
}

impl XlvError {
    /// One-line description for the status line.
    pub fn user_message(&self) -> String {
        match self {
            XlvError::IoError(e) => format!("I/O error: {e}"),
            XlvError::SpreadsheetError(e) => format!("Could not decode spreadsheet: {e}"),
            XlvError::LoadingFailed(msg) => format!("Loading failed: {msg}"),
            XlvError::FileNotFound => "File not found!".to_string(),
            XlvError::PermissionDenied => "Permission denied!".to_string(),
            XlvError::UnknownFileType => "Unknown file type, expected .xlsx or .xls".to_string(),
        }
    }
}

#[derive(Debug, Clone, Setters)]
pub struct XlvConfig {
    /// Crossterm event poll timeout in milliseconds.
    pub event_poll_time: u64,
    /// Rendered columns are capped at this many characters.
    pub max_column_width: usize,
}

impl Default for XlvConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    NextColumn,
    PrevColumn,
    ToggleSort,
    CycleFilterColumn,
    EnterFilter,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
    Loaded(Box<SheetTable>),
    LoadFailed(XlvError),
}

pub const HELP_TEXT: &str = "xlv - Excel spreadsheet viewer

  q             quit
  Left/Right    move the column header cursor
  s, Enter      toggle sort on that header (ascending, then descending)
  c             cycle the filter column (off -> All Columns -> each column)
  f, /          edit the filter text (needs a filter column)
  Up/Down       move the row cursor
  PgUp/PgDn     move the row cursor by a page
  g / G         jump to the first / last row
  ?             show this help
  Esc           close this popup / cancel filter editing
";
