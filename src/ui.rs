use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Stylize,
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Widget},
};

use crate::engine::SortDirection;
use crate::model::PageView;

pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        TableUI
    }

    pub fn draw(&self, view: &PageView, frame: &mut Frame) {
        let [table_area, cmd_area] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

        self.draw_table(view, frame, table_area);
        self.draw_cmdline(view, frame, cmd_area);

        if let Some(text) = &view.popup {
            self.draw_popup(text, frame);
        }
    }

    fn draw_table(&self, view: &PageView, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", view.title).bold());
        let hints = Line::from(vec![
            " / ".blue().bold(),
            "search ".into(),
            " s ".blue().bold(),
            "sort ".into(),
            " ? ".blue().bold(),
            "help ".into(),
            " q ".blue().bold(),
            "quit ".into(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(hints.centered())
            .border_set(border::THICK);

        // Loading and "no data" are distinct: the first means the snapshot
        // has not arrived yet, the second is a valid empty derivation.
        if view.loading {
            Paragraph::new("Loading ...")
                .centered()
                .block(block)
                .render(area, frame.buffer_mut());
            return;
        }
        if view.no_data {
            let body = if view.search_query.is_empty() {
                "No records in this export".to_string()
            } else {
                format!(
                    "No records match \"{}\"  (c to clear the search)",
                    view.search_query
                )
            };
            Paragraph::new(body)
                .centered()
                .block(block)
                .render(area, frame.buffer_mut());
            return;
        }

        let header = Row::new(view.headers.iter().map(|h| {
            let mut text = h.text.clone();
            match h.sort {
                Some(SortDirection::Ascending) => text.push_str(" ▲"),
                Some(SortDirection::Descending) => text.push_str(" ▼"),
                None => {}
            }
            let cell = Cell::from(text).bold();
            if h.selected { cell.reversed() } else { cell }
        }));

        let rows = view.rows.iter().enumerate().map(|(idx, cells)| {
            let row = Row::new(cells.iter().cloned().map(Cell::from));
            if idx == view.selected_row {
                row.reversed()
            } else {
                row
            }
        });

        let widths = vec![Constraint::Fill(1); view.headers.len().max(1)];
        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(block);
        frame.render_widget(table, area);
    }

    fn draw_cmdline(&self, view: &PageView, frame: &mut Frame, area: Rect) {
        if let Some(input) = &view.input {
            let prompt = format!("/{}", input.text);
            frame.render_widget(Paragraph::new(prompt), area);
            frame.set_cursor_position((area.x + 1 + input.cursor as u16, area.y));
            return;
        }

        let mut spans: Vec<Span> = vec![
            Span::from(format!(
                "page {}/{}",
                view.info.current_page, view.info.total_pages
            )),
            Span::from(format!("  {} records", view.info.total_filtered)),
        ];
        if !view.search_query.is_empty() {
            spans.push(Span::from(format!("  search: {}", view.search_query)).yellow());
        }
        if !view.status_message.is_empty() {
            spans.push(Span::from(format!("  {}", view.status_message)).dim());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_popup(&self, text: &str, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 44, 22);
        frame.render_widget(Clear, area);
        let block = Block::bordered()
            .title(Line::from(" help ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(Paragraph::new(text).block(block), area);
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
