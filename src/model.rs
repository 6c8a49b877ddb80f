use arboard::Clipboard;
use tracing::{debug, trace};

use crate::data::Dataset;
use crate::domain::{HELP_TEXT, Message, NexusError, ViewerConfig};
use crate::engine::{PageInfo, SortDirection, TableEngine};
use crate::inputter::{InputResult, Inputter};
use crate::record::MapRecord;

#[derive(Debug, PartialEq)]
pub enum Status {
    Empty,
    Loading,
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Table,
    SearchInput,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub text: String,
    pub sortable: bool,
    pub sort: Option<SortDirection>,
    pub selected: bool,
}

/// Snapshot of everything the renderer needs for one frame.
pub struct PageView {
    pub title: String,
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Vec<String>>,
    pub info: PageInfo,
    pub selected_row: usize,
    pub selected_column: usize,
    pub search_query: String,
    pub input: Option<InputResult>,
    pub status_message: String,
    pub popup: Option<String>,
    pub loading: bool,
    pub no_data: bool,
}

pub struct Model {
    pub status: Status,
    mode: Mode,
    engine: TableEngine<MapRecord>,
    dataset_name: String,
    selected_column: usize,
    selected_row: usize,
    input: Inputter,
    last_input: InputResult,
    clipboard: Option<Clipboard>,
    status_message: String,
    view: PageView,
}

impl Model {
    pub fn new(config: &ViewerConfig) -> Self {
        let mut model = Model {
            status: Status::Empty,
            mode: Mode::Table,
            engine: TableEngine::new(Vec::new(), config.page_size),
            dataset_name: String::new(),
            selected_column: 0,
            selected_row: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            clipboard: None,
            status_message: "Started nexus-view".to_string(),
            view: PageView {
                title: String::new(),
                headers: Vec::new(),
                rows: Vec::new(),
                info: PageInfo {
                    current_page: 1,
                    total_pages: 1,
                    total_filtered: 0,
                },
                selected_row: 0,
                selected_column: 0,
                search_query: String::new(),
                input: None,
                status_message: String::new(),
                popup: None,
                loading: false,
                no_data: true,
            },
        };
        model.rebuild_view();
        model
    }

    pub fn begin_loading(&mut self, name: &str) {
        self.status = Status::Loading;
        self.dataset_name = name.to_string();
        self.set_status_message(format!("Loading {name} ..."));
        self.rebuild_view();
    }

    /// Hand a materialized dataset to the engine. Replaces any previous
    /// snapshot outright.
    pub fn attach_dataset(&mut self, dataset: Dataset, config: &ViewerConfig) {
        let mut engine = TableEngine::new(dataset.default_columns(), config.page_size);
        if let Some(query) = &config.initial_search {
            engine = engine.with_search(query);
        }
        if let Some((key, direction)) = &config.initial_sort {
            engine = engine.with_sort(key, *direction);
        }
        engine.set_records(dataset.records);
        self.engine = engine;
        self.dataset_name = dataset.name;
        self.status = Status::Ready;
        self.selected_column = 0;
        self.selected_row = 0;
        let info = self.engine.page_info();
        self.set_status_message(format!("{} records", info.total_filtered));
        self.rebuild_view();
    }

    /// Whether key events should bypass the binding table and feed the
    /// search prompt directly.
    pub fn capturing_input(&self) -> bool {
        self.mode == Mode::SearchInput
    }

    pub fn page_view(&self) -> &PageView {
        &self.view
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Message) -> Result<(), NexusError> {
        trace!("Update: mode {:?}, message {:?}", self.mode, message);
        match self.mode {
            Mode::Table => match message {
                Message::Quit => self.quit(),
                Message::NextPage => self.go_to_page(self.engine.page_info().current_page + 1),
                Message::PrevPage => {
                    self.go_to_page(self.engine.page_info().current_page.saturating_sub(1))
                }
                Message::FirstPage => self.go_to_page(1),
                Message::LastPage => self.go_to_page(self.engine.page_info().total_pages),
                Message::SelectLeft => self.select_column_left(),
                Message::SelectRight => self.select_column_right(),
                Message::MoveUp => self.move_row(-1),
                Message::MoveDown => self.move_row(1),
                Message::ToggleSort => self.toggle_sort(),
                Message::BeginSearch => self.begin_search(),
                Message::ClearSearch => self.clear_search(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.mode = Mode::Help,
                Message::Exit | Message::RawKey(_) => {}
            },
            Mode::SearchInput => {
                if let Message::RawKey(key) = message {
                    self.read_search_key(key);
                }
            }
            Mode::Help => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.mode = Mode::Table,
                _ => {}
            },
        }
        self.rebuild_view();
        Ok(())
    }

    fn go_to_page(&mut self, page: usize) {
        self.engine.set_page(page);
        self.selected_row = 0;
    }

    fn select_column_left(&mut self) {
        self.selected_column = self.selected_column.saturating_sub(1);
    }

    fn select_column_right(&mut self) {
        let last = self.engine.columns().len().saturating_sub(1);
        self.selected_column = (self.selected_column + 1).min(last);
    }

    fn move_row(&mut self, step: i64) {
        let page_len = self.engine.page().len();
        if page_len == 0 {
            self.selected_row = 0;
            return;
        }
        let next = self.selected_row as i64 + step;
        self.selected_row = next.clamp(0, page_len as i64 - 1) as usize;
    }

    fn toggle_sort(&mut self) {
        let Some(column) = self.engine.columns().get(self.selected_column) else {
            return;
        };
        let header = column.header().to_string();
        let key = column
            .is_sortable()
            .then(|| column.key().map(str::to_string))
            .flatten();
        match key {
            Some(key) => {
                self.engine.set_sort_key(&key);
                let direction = match self.engine.state().direction {
                    SortDirection::Ascending => "ascending",
                    SortDirection::Descending => "descending",
                };
                self.set_status_message(format!("Sorted by \"{key}\" {direction}"));
            }
            None => {
                self.set_status_message(format!("Column \"{header}\" is not sortable"));
            }
        }
    }

    fn begin_search(&mut self) {
        self.mode = Mode::SearchInput;
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn read_search_key(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.mode = Mode::Table;
            if self.last_input.canceled {
                self.set_status_message("Search canceled");
            } else {
                let query = self.last_input.text.clone();
                self.engine.set_search_query(&query);
                self.selected_row = 0;
                let found = self.engine.page_info().total_filtered;
                self.set_status_message(format!("Found {found} matching records"));
            }
        }
    }

    fn clear_search(&mut self) {
        if !self.engine.state().search_query.is_empty() {
            self.engine.set_search_query("");
            self.selected_row = 0;
            self.set_status_message("Search cleared");
        }
    }

    fn selected_cell(&self) -> Option<String> {
        let page = self.engine.page();
        let record = page.get(self.selected_row)?;
        let column = self.engine.columns().get(self.selected_column)?;
        Some(column.cell(record))
    }

    fn copy_cell(&mut self) {
        let Some(cell) = self.selected_cell() else {
            return;
        };
        self.copy_to_clipboard(cell, "Copied cell");
    }

    fn copy_row(&mut self) {
        let page = self.engine.page();
        let Some(record) = page.get(self.selected_row) else {
            return;
        };
        let cells: Vec<String> = self
            .engine
            .columns()
            .iter()
            .map(|c| wrap_cell_content(&c.cell(record)))
            .collect();
        let row = cells.join(",");
        self.copy_to_clipboard(row, "Copied row");
    }

    // The clipboard handle is created on first use; a headless session
    // degrades to a status message instead of failing at startup.
    fn copy_to_clipboard(&mut self, content: String, note: &str) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    debug!("No clipboard available: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(()) => self.set_status_message(note),
                Err(e) => {
                    debug!("Clipboard write failed: {e:?}");
                    self.set_status_message("Clipboard write failed");
                }
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn rebuild_view(&mut self) {
        let info = self.engine.page_info();
        let state = self.engine.state();

        let headers: Vec<HeaderCell> = self
            .engine
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| HeaderCell {
                text: column.header().to_string(),
                sortable: column.is_sortable(),
                sort: match (column.key(), state.sort_key.as_deref()) {
                    (Some(key), Some(active)) if key == active => Some(state.direction),
                    _ => None,
                },
                selected: idx == self.selected_column,
            })
            .collect();

        let page = self.engine.page();
        let rows: Vec<Vec<String>> = page
            .iter()
            .map(|record| {
                self.engine
                    .columns()
                    .iter()
                    .map(|c| c.cell(record))
                    .collect()
            })
            .collect();

        let title = if state.search_query.is_empty() {
            self.dataset_name.clone()
        } else {
            format!("F[{}]", self.dataset_name)
        };

        self.selected_row = self.selected_row.min(rows.len().saturating_sub(1));

        self.view = PageView {
            title,
            headers,
            rows,
            info,
            selected_row: self.selected_row,
            selected_column: self.selected_column,
            search_query: state.search_query.clone(),
            input: (self.mode == Mode::SearchInput).then(|| self.last_input.clone()),
            status_message: self.status_message.clone(),
            popup: (self.mode == Mode::Help).then(|| HELP_TEXT.to_string()),
            loading: self.status == Status::Loading,
            no_data: self.status == Status::Ready && self.engine.is_page_empty(),
        };
    }
}

// Minimal csv quoting for clipboard rows.
fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);
    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_escaping || needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MapRecord, Value};
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn dataset() -> Dataset {
        let fields = vec!["name".to_string(), "score".to_string()];
        let records = (0..12)
            .map(|i| {
                MapRecord::new()
                    .with("name", Value::str(format!("scholar-{i:02}")))
                    .with("score", Value::Int((12 - i) * 10))
            })
            .collect();
        Dataset {
            name: "scholars.csv".to_string(),
            fields,
            records,
        }
    }

    fn ready_model() -> Model {
        let config = ViewerConfig::default().page_size(5);
        let mut model = Model::new(&config);
        model.begin_loading("scholars.csv");
        assert!(model.page_view().loading);
        model.attach_dataset(dataset(), &config);
        model
    }

    fn raw(c: char) -> Message {
        Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn loading_and_ready_are_distinct_states() {
        let model = ready_model();
        assert_eq!(model.status, Status::Ready);
        let view = model.page_view();
        assert!(!view.loading);
        assert!(!view.no_data);
        assert_eq!(view.info.total_pages, 3);
        assert_eq!(view.rows.len(), 5);
    }

    #[test]
    fn paging_messages_clamp_at_the_edges() {
        let mut model = ready_model();
        model.update(Message::PrevPage).unwrap();
        assert_eq!(model.page_view().info.current_page, 1);
        model.update(Message::LastPage).unwrap();
        assert_eq!(model.page_view().info.current_page, 3);
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.page_view().info.current_page, 3);
        // Last page holds the 2 remaining records.
        assert_eq!(model.page_view().rows.len(), 2);
        model.update(Message::FirstPage).unwrap();
        assert_eq!(model.page_view().info.current_page, 1);
    }

    #[test]
    fn sort_toggle_flips_the_header_indicator() {
        let mut model = ready_model();
        model.update(Message::SelectRight).unwrap();
        model.update(Message::ToggleSort).unwrap();
        let view = model.page_view();
        assert_eq!(view.headers[1].sort, Some(SortDirection::Ascending));
        assert_eq!(view.rows[0][1], "10");

        model.update(Message::ToggleSort).unwrap();
        let view = model.page_view();
        assert_eq!(view.headers[1].sort, Some(SortDirection::Descending));
        assert_eq!(view.rows[0][1], "120");
    }

    #[test]
    fn derived_column_refuses_to_sort() {
        let mut model = ready_model();
        // Move onto the derived "Filled" column (fields + 1 positions).
        model.update(Message::SelectRight).unwrap();
        model.update(Message::SelectRight).unwrap();
        model.update(Message::ToggleSort).unwrap();
        let view = model.page_view();
        assert!(view.status_message.contains("not sortable"));
        assert!(view.headers.iter().all(|h| h.sort.is_none()));
    }

    #[test]
    fn search_prompt_drives_the_filter() {
        let mut model = ready_model();
        model.update(Message::BeginSearch).unwrap();
        assert!(model.capturing_input());
        for c in "scholar-0".chars() {
            model.update(raw(c)).unwrap();
        }
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Enter,
                KeyModifiers::NONE,
            )))
            .unwrap();
        assert!(!model.capturing_input());
        let view = model.page_view();
        // scholar-00 .. scholar-09.
        assert_eq!(view.info.total_filtered, 10);
        assert_eq!(view.title, "F[scholars.csv]");
        assert_eq!(view.info.current_page, 1);

        model.update(Message::ClearSearch).unwrap();
        assert_eq!(model.page_view().info.total_filtered, 12);
        assert_eq!(model.page_view().title, "scholars.csv");
    }

    #[test]
    fn canceled_search_keeps_the_previous_query() {
        let mut model = ready_model();
        model.update(Message::BeginSearch).unwrap();
        model.update(raw('z')).unwrap();
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Esc,
                KeyModifiers::NONE,
            )))
            .unwrap();
        assert!(!model.capturing_input());
        assert_eq!(model.page_view().info.total_filtered, 12);
        assert_eq!(model.page_view().search_query, "");
    }

    #[test]
    fn no_data_is_signaled_for_an_excluding_filter() {
        let mut model = ready_model();
        model.update(Message::BeginSearch).unwrap();
        for c in "zzz".chars() {
            model.update(raw(c)).unwrap();
        }
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Enter,
                KeyModifiers::NONE,
            )))
            .unwrap();
        let view = model.page_view();
        assert!(view.no_data);
        assert!(!view.loading);
        assert_eq!(view.info.total_pages, 1);
        assert!(view.rows.is_empty());
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = ready_model();
        model.update(Message::Help).unwrap();
        assert!(model.page_view().popup.is_some());
        model.update(Message::Exit).unwrap();
        assert!(model.page_view().popup.is_none());
    }

    #[test]
    fn row_cursor_stays_inside_the_page() {
        let mut model = ready_model();
        for _ in 0..10 {
            model.update(Message::MoveDown).unwrap();
        }
        assert_eq!(model.page_view().selected_row, 4);
        for _ in 0..10 {
            model.update(Message::MoveUp).unwrap();
        }
        assert_eq!(model.page_view().selected_row, 0);
    }

    #[test]
    fn csv_wrapping_quotes_when_needed() {
        assert_eq!(wrap_cell_content("plain"), "plain");
        assert_eq!(wrap_cell_content("two words"), "\"two words\"");
        assert_eq!(wrap_cell_content("a\"b"), "\"a\"\"b\"");
    }
}
