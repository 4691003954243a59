use thiserror::Error;
use visit_spec::{ConfigLoadError, RenderRow, VisitRecord};

use crate::source::DataFetchError;

/// Current page and page count. `total_pages` is zero until the first count arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageState {
    pub current_page: usize,
    pub total_pages: usize,
}

impl PageState {
    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }
}

/// One loaded page: the records and the render list built from them.
#[derive(Debug, Clone)]
pub struct VisitPage {
    pub page: usize,
    pub records: Vec<VisitRecord>,
    pub rows: Vec<RenderRow>,
}

/// Why a page or page count could not be produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] DataFetchError),
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    #[error("page {page} is past the last page ({total} pages)")]
    OutOfRange { page: usize, total: usize },
    #[error("render worker stopped: {0}")]
    Worker(String),
}

/// The UI side of the presenter. Held weakly; every call happens only while
/// the consumer is still alive.
pub trait VisitsView: Send + Sync {
    fn display_visits(&self, page: VisitPage);

    /// `counter` is the formatted "page x of y" text, absent when no label is configured.
    fn page_state_changed(&self, state: PageState, counter: Option<String>);

    fn load_failed(&self, error: &LoadError);
}
