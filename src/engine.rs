use rayon::prelude::*;
use tracing::{trace, warn};

use crate::record::{Record, Value};

/// How a column obtains its cell value from a record. `Field` reads a raw
/// named field; `Derived` computes display text from the whole record.
/// Derived columns are presentation only: they take no part in search or
/// sort, which operate on raw stored values.
pub enum Accessor<R> {
    Field(String),
    Derived(Box<dyn Fn(&R) -> String + Send + Sync>),
}

/// One column of the view: header text, value accessor and whether the
/// column participates in sorting.
pub struct Column<R> {
    header: String,
    accessor: Accessor<R>,
    sortable: bool,
}

impl<R: Record> Column<R> {
    pub fn field(key: impl Into<String>, header: impl Into<String>) -> Self {
        Column {
            header: header.into(),
            accessor: Accessor::Field(key.into()),
            sortable: false,
        }
    }

    pub fn derived(
        header: impl Into<String>,
        render: impl Fn(&R) -> String + Send + Sync + 'static,
    ) -> Self {
        Column {
            header: header.into(),
            accessor: Accessor::Derived(Box::new(render)),
            sortable: false,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    /// The raw field key, if this is a `Field` column.
    pub fn key(&self) -> Option<&str> {
        match &self.accessor {
            Accessor::Field(key) => Some(key),
            Accessor::Derived(_) => None,
        }
    }

    /// Cell text for one record. Missing fields render like nulls.
    pub fn cell(&self, record: &R) -> String {
        match &self.accessor {
            Accessor::Field(key) => record
                .get(key)
                .map(Value::display)
                .unwrap_or_else(|| Value::Null.display()),
            Accessor::Derived(render) => render(record),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// The engine's only mutable state: search term, sort key/direction and the
/// current page. Owned by exactly one view instance, never persisted.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub current_page: usize,
    pub search_query: String,
    pub sort_key: Option<String>,
    pub direction: SortDirection,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            current_page: 1,
            search_query: String::new(),
            sort_key: None,
            direction: SortDirection::Ascending,
        }
    }
}

/// Page bookkeeping handed to the presentation side alongside the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_filtered: usize,
}

/// Generic tabular view: filter, sort and paginate an in-memory record
/// collection. The engine owns a snapshot of the records and a row-index
/// view over them; it performs no I/O and never mutates a record. The
/// derivation always runs filter → sort → paginate and is re-run whenever
/// the state or the snapshot changes, so the same (records, columns, state)
/// triple always yields the same page.
pub struct TableEngine<R> {
    records: Vec<R>,
    columns: Vec<Column<R>>,
    page_size: usize,
    state: ViewState,
    // Filtered and sorted indices into `records`. Pagination slices this.
    view: Vec<usize>,
}

impl<R: Record + Sync> TableEngine<R> {
    pub fn new(mut columns: Vec<Column<R>>, page_size: usize) -> Self {
        // A sortable flag on a derived column is a caller contract violation.
        // Downgrade it here so rendering never has to care.
        for column in columns.iter_mut() {
            if column.sortable && column.key().is_none() {
                warn!(
                    "Column \"{}\" is derived and cannot be sortable, disabling",
                    column.header
                );
                column.sortable = false;
            }
        }
        let mut engine = TableEngine {
            records: Vec::new(),
            columns,
            page_size: page_size.max(1),
            state: ViewState::default(),
            view: Vec::new(),
        };
        engine.derive();
        engine
    }

    /// Initial search override, applied before the first render.
    pub fn with_search(mut self, query: &str) -> Self {
        self.set_search_query(query);
        self
    }

    /// Initial sort override, applied before the first render.
    pub fn with_sort(mut self, key: &str, direction: SortDirection) -> Self {
        if self.sortable_key(key) {
            self.state.sort_key = Some(key.to_string());
            self.state.direction = direction;
            self.derive();
        } else {
            warn!("Ignoring initial sort on non-sortable column \"{key}\"");
        }
        self
    }

    /// Replace the record snapshot. Last write wins; the page is re-clamped
    /// against the new filtered total.
    pub fn set_records(&mut self, records: Vec<R>) {
        trace!("New record snapshot with {} rows", records.len());
        self.records = records;
        self.derive();
    }

    /// Replace the search term. An empty string means no filtering. Resets
    /// to page 1 since the new filter invalidates the old page framing.
    pub fn set_search_query(&mut self, query: &str) {
        self.state.search_query = query.to_string();
        self.state.current_page = 1;
        self.derive();
    }

    /// Sort by `key`: same key flips the direction, a new key starts
    /// ascending. Keys that do not name a sortable column are ignored.
    /// The current page is kept (re-clamped only if the total shrank).
    pub fn set_sort_key(&mut self, key: &str) {
        if !self.sortable_key(key) {
            trace!("Ignoring sort request for non-sortable column \"{key}\"");
            return;
        }
        if self.state.sort_key.as_deref() == Some(key) {
            self.state.direction = self.state.direction.flip();
        } else {
            self.state.sort_key = Some(key.to_string());
            self.state.direction = SortDirection::Ascending;
        }
        self.derive();
    }

    /// Jump to page `n`, clamped to the valid range.
    pub fn set_page(&mut self, n: usize) {
        self.state.current_page = n.clamp(1, self.total_pages());
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn columns(&self) -> &[Column<R>] {
        &self.columns
    }

    pub fn page_info(&self) -> PageInfo {
        PageInfo {
            current_page: self.state.current_page,
            total_pages: self.total_pages(),
            total_filtered: self.view.len(),
        }
    }

    /// The derived page: at most `page_size` records, in filtered-and-sorted
    /// order. An empty page is a valid terminal output, not an error.
    pub fn page(&self) -> Vec<&R> {
        let start = (self.state.current_page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.view.len());
        if start >= end {
            return Vec::new();
        }
        self.view[start..end]
            .iter()
            .map(|&idx| &self.records[idx])
            .collect()
    }

    pub fn is_page_empty(&self) -> bool {
        self.view.is_empty()
    }

    fn sortable_key(&self, key: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.is_sortable() && c.key() == Some(key))
    }

    fn total_pages(&self) -> usize {
        self.view.len().div_ceil(self.page_size).max(1)
    }

    // Rebuild the row-index view: filter, then sort. Pagination happens in
    // `page()` against the rebuilt view.
    fn derive(&mut self) {
        let filtered = self.filter();
        self.view = self.sort(filtered);
        self.state.current_page = self.state.current_page.clamp(1, self.total_pages());
        trace!(
            "Derived view: {} of {} rows, page {}/{}",
            self.view.len(),
            self.records.len(),
            self.state.current_page,
            self.total_pages()
        );
    }

    // A record passes the filter iff some raw string field shown by a
    // `Field` column contains the query, case-insensitively. Derived
    // columns and non-string values never match.
    fn filter(&self) -> Vec<usize> {
        if self.state.search_query.is_empty() {
            return (0..self.records.len()).collect();
        }
        let needle = self.state.search_query.to_lowercase();
        let keys: Vec<&str> = self.columns.iter().filter_map(Column::key).collect();
        self.records
            .par_iter()
            .enumerate()
            .filter(|(_, record)| {
                keys.iter().any(|key| {
                    record
                        .get(key)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    // Stable ascending sort on the raw field value; descending is the exact
    // reverse of the ascending order, so a header toggle exactly reverses
    // the sequence even across ties. No sort key keeps collection order.
    fn sort(&self, mut rows: Vec<usize>) -> Vec<usize> {
        let Some(key) = self.state.sort_key.as_deref() else {
            return rows;
        };
        let null = Value::Null;
        rows.sort_by(|&a, &b| {
            let va = self.records[a].get(key).unwrap_or(&null);
            let vb = self.records[b].get(key).unwrap_or(&null);
            va.natural_cmp(vb)
        });
        if self.state.direction == SortDirection::Descending {
            rows.reverse();
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MapRecord;

    fn rec(name: &str, score: i64) -> MapRecord {
        MapRecord::new()
            .with("name", Value::str(name))
            .with("score", Value::Int(score))
    }

    fn columns() -> Vec<Column<MapRecord>> {
        vec![
            Column::field("name", "Name").sortable(),
            Column::field("score", "Score").sortable(),
            Column::derived("Summary", |r: &MapRecord| {
                format!(
                    "{} ({})",
                    r.get("name").map(Value::display).unwrap_or_default(),
                    r.get("score").map(Value::display).unwrap_or_default()
                )
            }),
        ]
    }

    // 12 records with deliberate score ties to exercise stability.
    fn squad() -> Vec<MapRecord> {
        vec![
            rec("Amina", 70),
            rec("Bayo", 55),
            rec("Chiamaka", 90),
            rec("Dayo", 55),
            rec("Efe", 30),
            rec("Folake", 80),
            rec("Gbenga", 55),
            rec("Halima", 10),
            rec("Idris", 95),
            rec("Jide", 40),
            rec("Kemi", 60),
            rec("Lanre", 20),
        ]
    }

    fn engine_with(records: Vec<MapRecord>, page_size: usize) -> TableEngine<MapRecord> {
        let mut engine = TableEngine::new(columns(), page_size);
        engine.set_records(records);
        engine
    }

    fn names(page: &[&MapRecord]) -> Vec<String> {
        page.iter()
            .map(|r| r.get("name").unwrap().display())
            .collect()
    }

    #[test]
    fn empty_search_is_identity() {
        let engine = engine_with(squad(), 100);
        assert_eq!(names(&engine.page()), names(&squad().iter().collect::<Vec<_>>()));
        assert_eq!(engine.page_info().total_filtered, 12);
    }

    #[test]
    fn filter_matches_case_insensitive_substring() {
        let mut engine = engine_with(squad(), 100);
        engine.set_search_query("MI");
        // Amina, Halima, Kemi all contain "mi".
        assert_eq!(names(&engine.page()), vec!["Amina", "Halima", "Kemi"]);
    }

    #[test]
    fn filter_ignores_numeric_fields() {
        let mut engine = engine_with(squad(), 100);
        engine.set_search_query("55");
        assert!(engine.is_page_empty());
        assert_eq!(engine.page_info().total_filtered, 0);
    }

    #[test]
    fn filter_ignores_derived_columns() {
        // The derived summary renders "Amina (70)"; searching for the
        // parenthesis must not match anything.
        let mut engine = engine_with(squad(), 100);
        engine.set_search_query("(70)");
        assert!(engine.is_page_empty());
    }

    #[test]
    fn filter_resets_to_first_page() {
        let mut engine = engine_with(squad(), 5);
        engine.set_page(3);
        assert_eq!(engine.page_info().current_page, 3);
        engine.set_search_query("a");
        assert_eq!(engine.page_info().current_page, 1);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut engine = engine_with(squad(), 100);
        engine.set_sort_key("score");
        let ordered = names(&engine.page());
        // The three 55s keep their collection order: Bayo, Dayo, Gbenga.
        let ties: Vec<&String> = ordered
            .iter()
            .filter(|n| ["Bayo", "Dayo", "Gbenga"].contains(&n.as_str()))
            .collect();
        assert_eq!(ties, ["Bayo", "Dayo", "Gbenga"]);

        // Re-sorting the same key and direction reproduces the same output.
        engine.set_sort_key("score");
        engine.set_sort_key("score");
        assert_eq!(names(&engine.page()), ordered);
    }

    #[test]
    fn sort_toggle_exactly_reverses() {
        let mut engine = engine_with(squad(), 100);
        engine.set_sort_key("score");
        let ascending = names(&engine.page());
        engine.set_sort_key("score");
        let mut descending = names(&engine.page());
        descending.reverse();
        assert_eq!(ascending, descending);
    }

    #[test]
    fn switching_sort_column_starts_ascending() {
        let mut engine = engine_with(squad(), 100);
        engine.set_sort_key("score");
        engine.set_sort_key("score");
        assert_eq!(engine.state().direction, SortDirection::Descending);
        engine.set_sort_key("name");
        assert_eq!(engine.state().direction, SortDirection::Ascending);
        assert_eq!(names(&engine.page())[0], "Amina");
    }

    #[test]
    fn sort_request_on_derived_or_unknown_key_is_ignored() {
        let mut engine = engine_with(squad(), 100);
        let before = names(&engine.page());
        engine.set_sort_key("Summary");
        engine.set_sort_key("no_such_field");
        assert_eq!(names(&engine.page()), before);
        assert!(engine.state().sort_key.is_none());
    }

    #[test]
    fn sortable_flag_on_derived_column_is_downgraded() {
        let cols = vec![
            Column::field("name", "Name").sortable(),
            Column::derived("Summary", |_: &MapRecord| String::new()).sortable(),
        ];
        let engine = TableEngine::new(cols, 10);
        assert!(!engine.columns()[1].is_sortable());
    }

    #[test]
    fn pages_concatenate_to_the_full_sequence() {
        let mut engine = engine_with(squad(), 5);
        engine.set_sort_key("name");
        let mut all = Vec::new();
        for page in 1..=engine.page_info().total_pages {
            engine.set_page(page);
            all.extend(names(&engine.page()));
        }
        assert_eq!(all.len(), 12);
        let mut expected: Vec<String> =
            squad().iter().map(|r| r.get("name").unwrap().display()).collect();
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn page_requests_are_clamped() {
        let mut engine = engine_with(squad(), 5);
        assert_eq!(engine.page_info().total_pages, 3);
        engine.set_page(0);
        assert_eq!(engine.page_info().current_page, 1);
        engine.set_page(8);
        assert_eq!(engine.page_info().current_page, 3);
    }

    #[test]
    fn score_page_two_holds_ranks_six_through_ten() {
        let mut engine = engine_with(squad(), 5);
        engine.set_sort_key("score");
        engine.set_page(2);
        // Ascending scores: 10 20 30 40 55 | 55 55 60 70 80 | 90 95.
        // Ranks 6-10, ties stable: Dayo(55) Gbenga(55) Kemi(60) Amina(70)
        // Folake(80).
        assert_eq!(
            names(&engine.page()),
            vec!["Dayo", "Gbenga", "Kemi", "Amina", "Folake"]
        );
    }

    #[test]
    fn search_without_sort_keeps_collection_order() {
        let mut engine = engine_with(squad(), 5);
        engine.set_search_query("mi");
        let info = engine.page_info();
        assert_eq!(info.total_filtered, 3);
        assert_eq!(info.total_pages, 1);
        assert_eq!(names(&engine.page()), vec!["Amina", "Halima", "Kemi"]);
    }

    #[test]
    fn empty_collection_is_a_valid_terminal_state() {
        let engine = engine_with(Vec::new(), 5);
        let info = engine.page_info();
        assert_eq!(info.total_pages, 1);
        assert_eq!(info.current_page, 1);
        assert_eq!(info.total_filtered, 0);
        assert!(engine.page().is_empty());
        assert!(engine.is_page_empty());
    }

    #[test]
    fn snapshot_replacement_wins_and_reclamps_page() {
        let mut engine = engine_with(squad(), 5);
        engine.set_page(3);
        engine.set_records(squad().into_iter().take(4).collect());
        let info = engine.page_info();
        assert_eq!(info.total_pages, 1);
        assert_eq!(info.current_page, 1);
        assert_eq!(info.total_filtered, 4);
    }

    #[test]
    fn missing_fields_sort_like_nulls_at_the_end() {
        let mut records = squad();
        records.push(MapRecord::new().with("name", Value::str("Zed")));
        let mut engine = engine_with(records, 100);
        engine.set_sort_key("score");
        let ordered = names(&engine.page());
        assert_eq!(ordered.last().map(String::as_str), Some("Zed"));
    }
}
