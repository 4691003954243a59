//! Paginated presentation of visit summaries.
//!
//! A [`VisitsPresenter`] owns the page state for one client, fetches a page of
//! visits from a [`VisitDataSource`], turns it into a render list and hands the
//! result to a [`VisitsView`]. The view is held through a `Weak` reference: if
//! it is gone by the time a fetch completes, the result is dropped.

pub mod presenter;
pub mod source;
pub mod view;

pub use presenter::{DEFAULT_CONFIG_NAME, Phase, PresenterContext, Snapshot, VisitsPresenter};
pub use source::{DataFetchError, InMemorySource, VisitDataSource};
pub use view::{LoadError, PageState, VisitPage, VisitsView};
