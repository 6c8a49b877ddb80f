use std::io;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::engine::SortDirection;

/// Crate-wide error type. The view engine itself has no failure modes;
/// everything here belongs to the loading and terminal plumbing around it.
#[derive(Debug)]
pub enum NexusError {
    Io(io::Error),
    Polars(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<io::Error> for NexusError {
    fn from(err: io::Error) -> Self {
        NexusError::Io(err)
    }
}

impl From<PolarsError> for NexusError {
    fn from(err: PolarsError) -> Self {
        NexusError::Polars(err)
    }
}

/// Viewer configuration, fixed for the lifetime of the session. `page_size`
/// is not user-mutable at runtime.
#[derive(Debug, Clone, Setters)]
pub struct ViewerConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    #[setters(strip_option)]
    pub initial_search: Option<String>,
    #[setters(strip_option)]
    pub initial_sort: Option<(String, SortDirection)>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            event_poll_time: 100,
            page_size: 25,
            initial_search: None,
            initial_sort: None,
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Exit,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    SelectLeft,
    SelectRight,
    MoveUp,
    MoveDown,
    ToggleSort,
    BeginSearch,
    ClearSearch,
    CopyCell,
    CopyRow,
    Help,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
nexus-view keys

  q            quit
  Esc          close popup / cancel input
  Left/Right   select column
  Up/Down      select row on the current page
  n, PgDn      next page
  p, PgUp      previous page
  g, Home      first page
  G, End       last page
  s, Enter     sort by the selected column (again to reverse)
  /            search all text columns
  c            clear the search
  y            copy the selected cell
  Y            copy the selected row as csv
  ?            this help
";
