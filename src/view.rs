use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Shown when a row has no value for a requested column.
pub const MISSING_VALUE: &str = "∅";

/// A single decoded cell. Spreadsheets only ever hand us text, numbers or
/// nothing; everything else is stringified at the decoding boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => {
                // Excel stores every number as a float. Render whole values
                // without the trailing ".0" so filtering on "30" matches.
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Cell::Empty => Ok(()),
        }
    }
}

/// One decoded spreadsheet record: a mapping from column name to cell value.
/// Rows are created in bulk by the loader, never mutated afterwards, and
/// replaced wholesale when a new file is decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, Cell>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Display string for a column, degrading to a placeholder when the row
    /// has no such key instead of failing.
    pub fn display(&self, column: &str) -> String {
        match self.cells.get(column) {
            Some(cell) => cell.to_string(),
            None => MISSING_VALUE.to_string(),
        }
    }
}

impl FromIterator<(String, Cell)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Cell)>>(iter: T) -> Self {
        Row {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Which column the filter text is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// No column chosen yet. The filter box is hidden and every row passes.
    #[default]
    Unset,
    /// Match the filter text against every column of a row.
    All,
    /// Match against a single named column.
    Column(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// The active sort column and direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortConfig {
    pub key: Option<String>,
    pub direction: Direction,
}

/// The table view state machine: raw rows, the ordered column list captured
/// from the header row, and the selection / filter / sort state driven by
/// user events. `derive()` is the only read path and is pure.
#[derive(Debug, Default)]
pub struct TableView {
    columns: Vec<String>,
    rows: Vec<Row>,
    selection: Selection,
    filter_text: String,
    sort: SortConfig,
}

impl TableView {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn sort(&self) -> &SortConfig {
        &self.sort
    }

    /// Replace the dataset wholesale. Selection, filter text and sort state
    /// deliberately survive a reload.
    pub fn load_rows(&mut self, columns: Vec<String>, rows: Vec<Row>) {
        self.columns = columns;
        self.rows = rows;
    }

    /// Changing the filter column always clears the filter text.
    pub fn select_column(&mut self, selection: Selection) {
        self.selection = selection;
        self.filter_text.clear();
    }

    pub fn set_filter_text(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
    }

    /// A second press on the current ascending sort column flips it to
    /// descending; any other press sorts that column ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        if self.sort.key.as_deref() == Some(column) && self.sort.direction == Direction::Ascending {
            self.sort.direction = Direction::Descending;
        } else {
            self.sort = SortConfig {
                key: Some(column.to_string()),
                direction: Direction::Ascending,
            };
        }
    }

    /// The sequence to render, as a mapping from display position to raw row
    /// index: the full dataset is sorted first, then the sorted order is
    /// filtered. That ordering is part of the observable contract. The sort
    /// is stable, so equal keys keep their insertion order.
    pub fn derive(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.rows.len()).collect();

        if let Some(key) = &self.sort.key {
            indices.sort_by(|&a, &b| {
                let ord = compare_cells(self.rows[a].get(key), self.rows[b].get(key));
                match self.sort.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        let needle = self.filter_text.to_lowercase();
        indices.retain(|&idx| self.matches(&self.rows[idx], &needle));
        indices
    }

    fn matches(&self, row: &Row, needle: &str) -> bool {
        match &self.selection {
            Selection::Unset => true,
            Selection::All => self
                .columns
                .iter()
                .any(|column| row.display(column).to_lowercase().contains(needle)),
            Selection::Column(column) => row.display(column).to_lowercase().contains(needle),
        }
    }
}

/// Primitive comparison: two numbers compare numerically, everything else by
/// its display string, bytewise. Not locale aware.
fn compare_cells(a: Option<&Cell>, b: Option<&Cell>) -> Ordering {
    match (a, b) {
        (Some(Cell::Number(x)), Some(Cell::Number(y))) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (x, y) => display_or_missing(x).cmp(&display_or_missing(y)),
    }
}

fn display_or_missing(cell: Option<&Cell>) -> String {
    match cell {
        Some(cell) => cell.to_string(),
        None => MISSING_VALUE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Cell)]) -> Row {
        pairs
            .iter()
            .map(|(name, cell)| (name.to_string(), cell.clone()))
            .collect()
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn people() -> TableView {
        let mut view = TableView::default();
        view.load_rows(
            vec!["Name".to_string(), "Age".to_string()],
            vec![
                row(&[("Name", text("Bob")), ("Age", Cell::Number(30.0))]),
                row(&[("Name", text("Amy")), ("Age", Cell::Number(25.0))]),
            ],
        );
        view
    }

    fn names(view: &TableView) -> Vec<String> {
        view.derive()
            .into_iter()
            .map(|idx| view.rows()[idx].display("Name"))
            .collect()
    }

    #[test]
    fn derive_without_sort_or_filter_is_identity() {
        let view = people();
        assert_eq!(view.derive(), vec![0, 1]);
        assert_eq!(names(&view), vec!["Bob", "Amy"]);
    }

    #[test]
    fn toggling_the_same_column_reverses_the_order() {
        let mut view = TableView::default();
        view.load_rows(
            vec!["Name".to_string()],
            vec![
                row(&[("Name", text("carol"))]),
                row(&[("Name", text("amy"))]),
                row(&[("Name", text("bob"))]),
            ],
        );

        view.toggle_sort("Name");
        let ascending = view.derive();
        assert_eq!(ascending, vec![1, 2, 0]);

        view.toggle_sort("Name");
        assert_eq!(view.sort().direction, Direction::Descending);
        let descending = view.derive();
        let mut reversed = ascending.clone();
        reversed.reverse();
        assert_eq!(descending, reversed);
    }

    #[test]
    fn toggling_a_different_column_resets_to_ascending() {
        let mut view = people();
        view.toggle_sort("Name");
        view.toggle_sort("Name");
        assert_eq!(view.sort().direction, Direction::Descending);

        view.toggle_sort("Age");
        assert_eq!(view.sort().key.as_deref(), Some("Age"));
        assert_eq!(view.sort().direction, Direction::Ascending);
    }

    #[test]
    fn numbers_sort_numerically_not_lexicographically() {
        let mut view = TableView::default();
        view.load_rows(
            vec!["Age".to_string()],
            vec![
                row(&[("Age", Cell::Number(30.0))]),
                row(&[("Age", Cell::Number(9.0))]),
            ],
        );
        view.toggle_sort("Age");
        assert_eq!(view.derive(), vec![1, 0]);
    }

    #[test]
    fn ties_preserve_insertion_order_in_both_directions() {
        let mut view = TableView::default();
        view.load_rows(
            vec!["Group".to_string(), "Id".to_string()],
            vec![
                row(&[("Group", text("x")), ("Id", text("first"))]),
                row(&[("Group", text("x")), ("Id", text("second"))]),
            ],
        );

        view.toggle_sort("Group");
        assert_eq!(view.derive(), vec![0, 1]);
        view.toggle_sort("Group");
        assert_eq!(view.derive(), vec![0, 1]);
    }

    #[test]
    fn filtering_is_case_insensitive_substring() {
        let mut view = people();
        view.select_column(Selection::Column("Name".to_string()));

        view.set_filter_text("AMY");
        assert_eq!(names(&view), vec!["Amy"]);

        view.set_filter_text("bo");
        assert_eq!(names(&view), vec!["Bob"]);
    }

    #[test]
    fn all_columns_filter_is_a_superset_of_any_single_column() {
        let mut view = people();
        let needle = "b";

        view.select_column(Selection::All);
        view.set_filter_text(needle);
        let all: Vec<usize> = view.derive();

        for column in ["Name", "Age"] {
            view.select_column(Selection::Column(column.to_string()));
            view.set_filter_text(needle);
            for idx in view.derive() {
                assert!(all.contains(&idx), "{column} match {idx} missing from All");
            }
        }
    }

    #[test]
    fn selecting_a_column_clears_the_filter_text() {
        let mut view = people();
        view.select_column(Selection::All);
        view.set_filter_text("bob");
        assert_eq!(view.filter_text(), "bob");

        view.select_column(Selection::Column("Age".to_string()));
        assert_eq!(view.filter_text(), "");
    }

    #[test]
    fn empty_filter_text_matches_every_row() {
        let mut view = people();
        view.select_column(Selection::Column("Name".to_string()));
        assert_eq!(view.derive().len(), 2);
    }

    #[test]
    fn unset_selection_skips_filtering() {
        let mut view = people();
        view.set_filter_text("no such value");
        assert_eq!(view.derive().len(), 2);
    }

    #[test]
    fn missing_keys_degrade_to_a_placeholder() {
        let mut view = TableView::default();
        view.load_rows(
            vec!["Name".to_string(), "City".to_string()],
            vec![
                row(&[("Name", text("Bob")), ("City", text("Graz"))]),
                row(&[("Name", text("Amy"))]),
            ],
        );

        view.select_column(Selection::Column("City".to_string()));
        view.set_filter_text("graz");
        assert_eq!(view.derive(), vec![0]);

        view.toggle_sort("City");
        // The row without the key still sorts, via the placeholder.
        assert_eq!(view.derive(), vec![0]);
        assert_eq!(view.rows()[1].display("City"), MISSING_VALUE);
    }

    #[test]
    fn reload_preserves_selection_filter_and_sort() {
        let mut view = people();
        view.select_column(Selection::Column("Name".to_string()));
        view.set_filter_text("amy");
        view.toggle_sort("Name");

        view.load_rows(
            vec!["Name".to_string()],
            vec![
                row(&[("Name", text("Amy"))]),
                row(&[("Name", text("Zoe"))]),
            ],
        );

        assert_eq!(
            view.selection(),
            &Selection::Column("Name".to_string())
        );
        assert_eq!(view.filter_text(), "amy");
        assert_eq!(view.sort().key.as_deref(), Some("Name"));
        assert_eq!(names(&view), vec!["Amy"]);
    }

    #[test]
    fn sort_then_filter_scenario() {
        let mut view = people();

        view.toggle_sort("Name");
        assert_eq!(names(&view), vec!["Amy", "Bob"]);

        view.toggle_sort("Name");
        assert_eq!(names(&view), vec!["Bob", "Amy"]);

        view.select_column(Selection::Column("Age".to_string()));
        view.set_filter_text("30");
        assert_eq!(names(&view), vec!["Bob"]);
    }

    #[test]
    fn derive_does_not_mutate_the_raw_rows() {
        let mut view = people();
        let before = view.rows().to_vec();
        view.toggle_sort("Name");
        view.select_column(Selection::All);
        view.set_filter_text("amy");
        let _ = view.derive();
        assert_eq!(view.rows(), &before[..]);
    }
}
