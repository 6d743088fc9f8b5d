use std::time::{Duration, Instant};

use ratatui::crossterm::event::KeyEvent;
use tracing::{error, info, trace};

use crate::domain::{HELP_TEXT, Message, XlvConfig, XlvError};
use crate::inputter::{InputResult, Inputter};
use crate::loader::SheetTable;
use crate::ui::{FILTER_LINE_HEIGHT, STATUS_LINE_HEIGHT, TABLE_HEADER_HEIGHT, TITLE_HEIGHT};
use crate::view::{Direction, Selection, TableView};

// After this long the status line falls back to the key hints.
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

const KEY_HINTS: &str = "q quit  \u{2190}/\u{2192} column  s sort  c filter column  f filter  ? help";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
    Empty,
    Loading,
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modus {
    Table,
    FilterInput,
    Popup,
}

/// One rendered column header: label plus the sort affordance. The arrow
/// defaults to ascending for columns that are not the active sort key.
pub struct HeaderCell {
    pub label: String,
    pub arrow: char,
    pub is_sort_key: bool,
    pub is_active: bool,
    pub width: usize,
}

/// What the filter line shows: the selected column label, the current text
/// and the cursor position while editing.
pub struct FilterLine {
    pub label: String,
    pub text: String,
    pub cursor: Option<usize>,
}

pub struct Model {
    config: XlvConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    file_label: String,
    sheet_name: String,
    view: TableView,
    widths: Vec<usize>,
    derived: Vec<usize>,
    curser_row: usize,
    offset_row: usize,
    active_column: usize,
    offset_column: usize,
    table_width: usize,
    table_height: usize,
    input: Inputter,
    last_input: InputResult,
    filter_backup: String,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &XlvConfig, file_label: String) -> Self {
        let status_message = format!("Loading {file_label} ...");
        Self {
            config: config.clone(),
            status: Status::Loading,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            file_label,
            sheet_name: String::new(),
            view: TableView::default(),
            widths: Vec::new(),
            derived: Vec::new(),
            curser_row: 0,
            offset_row: 0,
            active_column: 0,
            offset_column: 0,
            table_width: 0,
            table_height: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            filter_backup: String::new(),
            popup_message: String::new(),
            status_message,
            last_status_message_update: Instant::now(),
        }
    }

    pub fn update(&mut self, message: Message) -> Result<(), XlvError> {
        trace!("Update: modus {:?}, message {:?}", self.modus, message);
        match message {
            Message::Loaded(table) => self.loaded(*table),
            Message::LoadFailed(e) => self.load_failed(e),
            Message::Resize(width, height) => self.ui_resize(width, height),
            Message::Quit => self.quit(),
            message => match self.modus {
                Modus::Table => match message {
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MovePageUp => self.move_table_selection_up(self.table_height.max(1)),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.table_height.max(1))
                    }
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::PrevColumn => self.previous_column(),
                    Message::NextColumn => self.next_column(),
                    Message::ToggleSort => self.toggle_sort_active(),
                    Message::CycleFilterColumn => self.cycle_filter_column(),
                    Message::EnterFilter => self.enter_filter(),
                    Message::Help => self.show_help(),
                    Message::Exit => (),
                    _ => (),
                },
                Modus::FilterInput => {
                    if let Message::RawKey(key) = message {
                        self.raw_input(key);
                    }
                }
                Modus::Popup => match message {
                    Message::Exit | Message::Help => self.close_popup(),
                    _ => (),
                },
            },
        }
        Ok(())
    }

    /// Raw key events are routed to the filter editor instead of the keymap.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FilterInput
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    // -------------------- Message handling ---------------------- //

    fn loaded(&mut self, table: SheetTable) {
        info!(
            "Loaded sheet \"{}\" with {} rows",
            table.name,
            table.rows.len()
        );
        self.sheet_name = table.name;
        self.widths = table.widths;
        // Selection, filter and sort state survive a reload on purpose.
        self.view.load_rows(table.columns, table.rows);
        self.active_column = self
            .active_column
            .min(self.view.columns().len().saturating_sub(1));
        self.offset_column = self.offset_column.min(self.active_column);
        self.status = Status::Ready;
        self.rederive();
        self.set_status_message(format!(
            "Loaded {} rows, {} columns",
            self.view.rows().len(),
            self.view.columns().len()
        ));
    }

    /// A failed load never commits new rows; whatever was shown stays shown.
    fn load_failed(&mut self, e: XlvError) {
        error!("Loading failed: {:?}", e);
        if self.view.rows().is_empty() {
            self.status = Status::Empty;
        } else {
            self.status = Status::Ready;
        }
        self.set_status_message(e.user_message());
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized to w:{width}, h:{height}");
        self.table_width = width;
        self.table_height = height.saturating_sub(
            TITLE_HEIGHT + TABLE_HEADER_HEIGHT + FILTER_LINE_HEIGHT + STATUS_LINE_HEIGHT,
        );
        let abs = self.offset_row + self.curser_row;
        self.offset_row = 0;
        self.curser_row = 0;
        if !self.derived.is_empty() {
            self.set_cursor_abs(abs.min(self.derived.len() - 1));
        }
        self.ensure_active_visible();
    }

    fn toggle_sort_active(&mut self) {
        let Some(name) = self.view.columns().get(self.active_column).cloned() else {
            return;
        };
        self.view.toggle_sort(&name);
        self.rederive();
        let arrow = direction_arrow(self.view.sort().direction);
        self.set_status_message(format!("Sorted by {name} {arrow}"));
    }

    fn cycle_filter_column(&mut self) {
        let columns = self.view.columns();
        let next = match self.view.selection() {
            Selection::Unset => Selection::All,
            Selection::All => match columns.first() {
                Some(name) => Selection::Column(name.clone()),
                None => Selection::Unset,
            },
            Selection::Column(name) => match columns.iter().position(|c| c == name) {
                Some(idx) if idx + 1 < columns.len() => {
                    Selection::Column(columns[idx + 1].clone())
                }
                _ => Selection::Unset,
            },
        };
        let label = match &next {
            Selection::Unset => "off".to_string(),
            Selection::All => "All Columns".to_string(),
            Selection::Column(name) => name.clone(),
        };
        // Also clears the filter text.
        self.view.select_column(next);
        self.rederive();
        self.set_status_message(format!("Filter column: {label}"));
    }

    fn enter_filter(&mut self) {
        if self.view.selection() == &Selection::Unset {
            self.set_status_message("Choose a filter column first (press c)");
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::FilterInput;
        self.filter_backup = self.view.filter_text().to_string();
        self.input.seed(&self.filter_backup);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.canceled {
            // Editing aborted, put the previous filter text back.
            self.view.set_filter_text(self.filter_backup.clone());
            self.modus = Modus::Table;
        } else {
            // Re-derive on every keystroke so the table filters live.
            self.view.set_filter_text(self.last_input.input.clone());
            if self.last_input.finished {
                self.modus = Modus::Table;
            }
        }
        self.rederive();
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn close_popup(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Popup;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // -------------------- Cursor handling ---------------------- //

    fn rederive(&mut self) {
        self.derived = self.view.derive();
        let abs = self.offset_row + self.curser_row;
        self.offset_row = 0;
        self.curser_row = 0;
        if !self.derived.is_empty() {
            self.set_cursor_abs(abs.min(self.derived.len() - 1));
        }
    }

    fn set_cursor_abs(&mut self, abs: usize) {
        let height = self.table_height.max(1);
        if abs < self.offset_row {
            self.offset_row = abs;
            self.curser_row = 0;
        } else if abs >= self.offset_row + height {
            self.offset_row = abs + 1 - height;
            self.curser_row = abs - self.offset_row;
        } else {
            self.curser_row = abs - self.offset_row;
        }
    }

    fn move_table_selection_up(&mut self, size: usize) {
        if self.derived.is_empty() {
            return;
        }
        let abs = (self.offset_row + self.curser_row).saturating_sub(size);
        self.set_cursor_abs(abs);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        if self.derived.is_empty() {
            return;
        }
        let abs = (self.offset_row + self.curser_row + size).min(self.derived.len() - 1);
        self.set_cursor_abs(abs);
    }

    fn move_table_selection_beginning(&mut self) {
        self.offset_row = 0;
        self.curser_row = 0;
    }

    fn move_table_selection_end(&mut self) {
        if self.derived.is_empty() {
            return;
        }
        self.set_cursor_abs(self.derived.len() - 1);
    }

    fn previous_column(&mut self) {
        self.active_column = self.active_column.saturating_sub(1);
        self.ensure_active_visible();
    }

    fn next_column(&mut self) {
        let ncols = self.view.columns().len();
        if ncols == 0 {
            return;
        }
        self.active_column = (self.active_column + 1).min(ncols - 1);
        self.ensure_active_visible();
    }

    /// Keep the active header on screen: walk left from the active column
    /// and keep as many columns as fit into the table width.
    fn ensure_active_visible(&mut self) {
        if self.active_column <= self.offset_column {
            self.offset_column = self.active_column;
            return;
        }
        let max = self.config.max_column_width;
        let mut used = 0;
        let mut first = self.active_column;
        for idx in (self.offset_column..=self.active_column).rev() {
            let width = self.column_width(idx).min(max) + 1;
            if used + width > self.table_width.max(1) {
                break;
            }
            used += width;
            first = idx;
        }
        self.offset_column = first;
    }

    fn column_width(&self, idx: usize) -> usize {
        let label = self
            .view
            .columns()
            .get(idx)
            .map(|name| name.chars().count())
            .unwrap_or(0);
        // Header label plus the sort arrow.
        self.widths.get(idx).copied().unwrap_or(0).max(label + 2)
    }

    // -------------------- UI accessors ---------------------- //

    pub fn title_line(&self) -> String {
        match self.status {
            Status::Loading => format!("{} \u{2014} loading ...", self.file_label),
            Status::Empty => format!("{} \u{2014} no data", self.file_label),
            _ => format!(
                "{} [{}] \u{2014} {}/{} rows",
                self.file_label,
                self.sheet_name,
                self.derived.len(),
                self.view.rows().len()
            ),
        }
    }

    pub fn header_cells(&self) -> Vec<HeaderCell> {
        let sort = self.view.sort();
        self.view
            .columns()
            .iter()
            .enumerate()
            .skip(self.offset_column)
            .map(|(idx, name)| {
                let is_sort_key = sort.key.as_deref() == Some(name.as_str());
                let arrow = if is_sort_key {
                    direction_arrow(sort.direction)
                } else {
                    direction_arrow(Direction::Ascending)
                };
                HeaderCell {
                    label: name.clone(),
                    arrow,
                    is_sort_key,
                    is_active: idx == self.active_column,
                    width: self.column_width(idx),
                }
            })
            .collect()
    }

    /// The visible window of `derive()`'s output, as display strings.
    pub fn visible_rows(&self) -> Vec<Vec<String>> {
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + self.table_height.max(1), self.derived.len());
        let columns = &self.view.columns()[self.offset_column.min(self.view.columns().len())..];

        self.derived[rbegin..rend]
            .iter()
            .map(|&ridx| {
                let row = &self.view.rows()[ridx];
                columns.iter().map(|name| row.display(name)).collect()
            })
            .collect()
    }

    pub fn selected_visible_row(&self) -> Option<usize> {
        if self.derived.is_empty() {
            None
        } else {
            Some(self.curser_row)
        }
    }

    /// The filter line is only shown once a filter column is selected.
    pub fn filter_line(&self) -> Option<FilterLine> {
        let label = match self.view.selection() {
            Selection::Unset => return None,
            Selection::All => "All Columns".to_string(),
            Selection::Column(name) => name.clone(),
        };
        let editing = self.modus == Modus::FilterInput;
        Some(FilterLine {
            label,
            text: if editing {
                self.last_input.input.clone()
            } else {
                self.view.filter_text().to_string()
            },
            cursor: editing.then_some(self.last_input.curser_pos),
        })
    }

    pub fn status_line(&self) -> String {
        if self.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            self.status_message.clone()
        } else {
            KEY_HINTS.to_string()
        }
    }

    pub fn show_popup(&self) -> Option<&str> {
        (self.modus == Modus::Popup).then_some(self.popup_message.as_str())
    }

    #[cfg(test)]
    fn view(&self) -> &TableView {
        &self.view
    }
}

fn direction_arrow(direction: Direction) -> char {
    match direction {
        Direction::Ascending => '\u{25b2}',
        Direction::Descending => '\u{25bc}',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Cell, Row};
    use ratatui::crossterm::event::KeyCode;

    fn people_table() -> SheetTable {
        let columns = vec!["Name".to_string(), "Age".to_string()];
        let rows: Vec<Row> = [("Bob", 30.0), ("Amy", 25.0)]
            .iter()
            .map(|(name, age)| {
                [
                    ("Name".to_string(), Cell::Text(name.to_string())),
                    ("Age".to_string(), Cell::Number(*age)),
                ]
                .into_iter()
                .collect()
            })
            .collect();
        SheetTable {
            name: "Sheet1".to_string(),
            columns,
            rows,
            widths: vec![4, 3],
        }
    }

    fn ready_model() -> Model {
        let mut model = Model::init(&XlvConfig::default(), "people.xlsx".to_string());
        model.update(Message::Resize(80, 24)).unwrap();
        model
            .update(Message::Loaded(Box::new(people_table())))
            .unwrap();
        model
    }

    fn shown_names(model: &Model) -> Vec<String> {
        model
            .visible_rows()
            .into_iter()
            .map(|row| row[0].clone())
            .collect()
    }

    #[test]
    fn loading_a_table_makes_the_model_ready() {
        let model = ready_model();
        assert_eq!(model.status, Status::Ready);
        assert_eq!(shown_names(&model), vec!["Bob", "Amy"]);
        assert!(model.title_line().contains("2/2 rows"));
    }

    #[test]
    fn a_failed_load_keeps_prior_rows() {
        let mut model = ready_model();
        model
            .update(Message::LoadFailed(XlvError::UnknownFileType))
            .unwrap();
        assert_eq!(model.status, Status::Ready);
        assert_eq!(shown_names(&model), vec!["Bob", "Amy"]);
        assert!(model.status_line().contains("Unknown file type"));
    }

    #[test]
    fn sorting_through_messages_follows_the_toggle_contract() {
        let mut model = ready_model();

        model.update(Message::ToggleSort).unwrap();
        assert_eq!(shown_names(&model), vec!["Amy", "Bob"]);

        model.update(Message::ToggleSort).unwrap();
        assert_eq!(shown_names(&model), vec!["Bob", "Amy"]);

        // Moving to Age and sorting resets to ascending.
        model.update(Message::NextColumn).unwrap();
        model.update(Message::ToggleSort).unwrap();
        assert_eq!(shown_names(&model), vec!["Amy", "Bob"]);
    }

    #[test]
    fn header_arrows_mark_the_active_sort() {
        let mut model = ready_model();
        model.update(Message::ToggleSort).unwrap();
        model.update(Message::ToggleSort).unwrap();

        let headers = model.header_cells();
        assert_eq!(headers[0].arrow, '\u{25bc}');
        assert!(headers[0].is_sort_key);
        // Non-active columns default to the ascending arrow.
        assert_eq!(headers[1].arrow, '\u{25b2}');
        assert!(!headers[1].is_sort_key);
    }

    #[test]
    fn filter_editing_is_live_and_esc_restores_the_old_text() {
        let mut model = ready_model();

        // No filter column chosen yet, the editor must not open.
        model.update(Message::EnterFilter).unwrap();
        assert!(!model.raw_keyevents());
        assert!(model.filter_line().is_none());

        model.update(Message::CycleFilterColumn).unwrap(); // All Columns
        model.update(Message::EnterFilter).unwrap();
        assert!(model.raw_keyevents());

        for c in "amy".chars() {
            model
                .update(Message::RawKey(KeyCode::Char(c).into()))
                .unwrap();
        }
        // Live filtering while still editing.
        assert_eq!(shown_names(&model), vec!["Amy"]);

        model
            .update(Message::RawKey(KeyCode::Esc.into()))
            .unwrap();
        assert!(!model.raw_keyevents());
        assert_eq!(model.view().filter_text(), "");
        assert_eq!(shown_names(&model), vec!["Bob", "Amy"]);
    }

    #[test]
    fn filter_scenario_from_the_original() {
        let mut model = ready_model();

        // Cycle to the Age column: off -> All -> Name -> Age.
        model.update(Message::CycleFilterColumn).unwrap();
        model.update(Message::CycleFilterColumn).unwrap();
        model.update(Message::CycleFilterColumn).unwrap();
        assert_eq!(
            model.view().selection(),
            &Selection::Column("Age".to_string())
        );

        model.update(Message::EnterFilter).unwrap();
        for c in "30".chars() {
            model
                .update(Message::RawKey(KeyCode::Char(c).into()))
                .unwrap();
        }
        model
            .update(Message::RawKey(KeyCode::Enter.into()))
            .unwrap();

        assert_eq!(shown_names(&model), vec!["Bob"]);
        assert!(model.filter_line().is_some());
    }

    #[test]
    fn cycling_the_filter_column_clears_the_text() {
        let mut model = ready_model();
        model.update(Message::CycleFilterColumn).unwrap();
        model.update(Message::EnterFilter).unwrap();
        model
            .update(Message::RawKey(KeyCode::Char('b').into()))
            .unwrap();
        model
            .update(Message::RawKey(KeyCode::Enter.into()))
            .unwrap();
        assert_eq!(model.view().filter_text(), "b");

        model.update(Message::CycleFilterColumn).unwrap();
        assert_eq!(model.view().filter_text(), "");
    }

    #[test]
    fn row_cursor_stays_inside_the_window() {
        let mut model = Model::init(&XlvConfig::default(), "tall.xlsx".to_string());
        model.update(Message::Resize(80, 10)).unwrap();

        let columns = vec!["N".to_string()];
        let rows: Vec<Row> = (0..50)
            .map(|i| {
                [("N".to_string(), Cell::Number(i as f64))]
                    .into_iter()
                    .collect()
            })
            .collect();
        let table = SheetTable {
            name: "S".to_string(),
            columns,
            rows,
            widths: vec![2],
        };
        model.update(Message::Loaded(Box::new(table))).unwrap();

        model.update(Message::MoveEnd).unwrap();
        let window = model.visible_rows();
        assert_eq!(window.last().unwrap()[0], "49");
        assert_eq!(
            model.selected_visible_row().unwrap(),
            window.len() - 1
        );

        model.update(Message::MoveBeginning).unwrap();
        assert_eq!(model.visible_rows()[0][0], "0");
        assert_eq!(model.selected_visible_row(), Some(0));
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = ready_model();
        model.update(Message::Help).unwrap();
        assert!(model.show_popup().is_some());
        // Movement keys are ignored while the popup is open.
        model.update(Message::MoveDown).unwrap();
        assert_eq!(model.selected_visible_row(), Some(0));
        model.update(Message::Exit).unwrap();
        assert!(model.show_popup().is_none());
    }
}
