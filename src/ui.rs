use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    text::Line,
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use crate::domain::XlvConfig;
use crate::model::Model;

pub const TITLE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const FILTER_LINE_HEIGHT: usize = 1;
pub const STATUS_LINE_HEIGHT: usize = 1;

pub struct TableUI {
    config: XlvConfig,
}

impl TableUI {
    pub fn new(config: &XlvConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [title_area, table_area, filter_area, status_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT as u16),
            Constraint::Min(1),
            Constraint::Length(FILTER_LINE_HEIGHT as u16),
            Constraint::Length(STATUS_LINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_title(model, frame, title_area);
        self.draw_table(model, frame, table_area);
        self.draw_filter(model, frame, filter_area);
        self.draw_status(model, frame, status_area);

        if let Some(text) = model.show_popup() {
            self.draw_popup(frame, text);
        }
    }

    fn draw_title(&self, model: &Model, frame: &mut Frame, area: Rect) {
        frame.render_widget(Paragraph::new(model.title_line().bold()), area);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let headers = model.header_cells();
        if headers.is_empty() {
            frame.render_widget(
                Paragraph::new("No table to show yet ...".dim()).centered(),
                area,
            );
            return;
        }

        let header_row = Row::new(headers.iter().map(|h| {
            let mut style = Style::new().bold();
            if h.is_sort_key {
                style = style.underlined();
            }
            if h.is_active {
                style = style.reversed();
            }
            Cell::from(format!("{} {}", h.label, h.arrow)).style(style)
        }));

        let widths: Vec<Constraint> = headers
            .iter()
            .map(|h| Constraint::Length(h.width.min(self.config.max_column_width) as u16))
            .collect();

        let rows = model.visible_rows().into_iter().map(Row::new);
        let table = Table::new(rows, widths)
            .header(header_row)
            .row_highlight_style(Style::new().reversed());

        let mut state = TableState::default();
        state.select(model.selected_visible_row());
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_filter(&self, model: &Model, frame: &mut Frame, area: Rect) {
        match model.filter_line() {
            Some(filter) => {
                let prefix = format!("Filter [{}]: ", filter.label);
                let line = Line::from(vec![prefix.clone().bold(), filter.text.clone().into()]);
                frame.render_widget(Paragraph::new(line), area);

                if let Some(cursor) = filter.cursor {
                    let x = area.x + (prefix.chars().count() + cursor).min(u16::MAX as usize) as u16;
                    frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
                }
            }
            None => frame.render_widget(
                Paragraph::new("Press c to choose a filter column".dim()),
                area,
            ),
        }
    }

    fn draw_status(&self, model: &Model, frame: &mut Frame, area: Rect) {
        frame.render_widget(Paragraph::new(model.status_line()), area);
    }

    fn draw_popup(&self, frame: &mut Frame, text: &str) {
        let area = centered_rect(frame.area(), 60, 70);
        frame.render_widget(Clear, area);
        let block = Block::bordered().title(" Help ");
        frame.render_widget(Paragraph::new(text).block(block), area);
    }
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [_, vertical, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, horizontal, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(vertical);
    horizontal
}
