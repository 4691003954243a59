use std::sync::{Arc, Weak};

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use visit_spec::{CachedConfigLoader, LabelId, VisitRenderer};

use crate::source::{DataFetchError, VisitDataSource};
use crate::view::{LoadError, PageState, VisitPage, VisitsView};

/// Default layout file for a visit row.
pub const DEFAULT_CONFIG_NAME: &str = "visit_row.yml";

/// Collaborators a presenter works with.
pub struct PresenterContext<S> {
    pub source: Arc<S>,
    pub loader: Arc<CachedConfigLoader>,
    pub renderer: Arc<VisitRenderer>,
    pub config_name: String,
}

impl<S> PresenterContext<S> {
    pub fn new(source: Arc<S>, loader: Arc<CachedConfigLoader>, renderer: Arc<VisitRenderer>) -> Self {
        Self {
            source,
            loader,
            renderer,
            config_name: DEFAULT_CONFIG_NAME.to_string(),
        }
    }

    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = name.into();
        self
    }
}

/// Where the presenter is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading { page: usize },
    Loaded,
    /// The consumer went away. Nothing is delivered from here on.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub state: PageState,
}

enum Command {
    LoadPage(usize),
    Next,
    Previous,
    RefreshPageCount,
    Detach,
    Snapshot(oneshot::Sender<Snapshot>),
    PageLoaded {
        request: u64,
        page: usize,
        result: Result<VisitPage, LoadError>,
    },
    PageCountLoaded(Result<usize, DataFetchError>),
}

/// Handle to a running visits presenter.
///
/// All calls return immediately; results reach the consumer through
/// [`VisitsView`]. The presenter task stops once every handle is dropped and no
/// fetch is outstanding.
#[derive(Clone)]
pub struct VisitsPresenter {
    commands: mpsc::UnboundedSender<Command>,
}

impl VisitsPresenter {
    /// Start a presenter for `entity_id` on the current tokio runtime.
    pub fn spawn<S: VisitDataSource>(
        entity_id: impl Into<String>,
        context: PresenterContext<S>,
        view: Weak<dyn VisitsView>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = Actor {
            entity_id: entity_id.into(),
            context,
            view: Some(view),
            state: PageState::default(),
            phase: Phase::Idle,
            loaded_once: false,
            pending_page: None,
            latest_request: None,
            next_request: 0,
            completions: commands.downgrade(),
        };
        tokio::spawn(actor.run(receiver));
        Self { commands }
    }

    /// Fetch and render page `page`. Ignored while another load is in flight;
    /// a page past the known count is reported through [`VisitsView::load_failed`].
    pub fn load_page(&self, page: usize) {
        self.send(Command::LoadPage(page));
    }

    /// Move one page forward if there is one.
    pub fn next(&self) {
        self.send(Command::Next);
    }

    /// Move one page back if there is one.
    pub fn previous(&self) {
        self.send(Command::Previous);
    }

    /// Re-read the total page count without reloading the current page.
    pub fn refresh_page_count(&self) {
        self.send(Command::RefreshPageCount);
    }

    /// Drop the consumer. Outstanding work still finishes but is discarded.
    pub fn detach(&self) {
        self.send(Command::Detach);
    }

    /// Current phase and page state, or `None` if the presenter task has stopped.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply));
        response.await.ok()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("visits presenter already stopped");
        }
    }
}

struct Actor<S> {
    entity_id: String,
    context: PresenterContext<S>,
    view: Option<Weak<dyn VisitsView>>,
    state: PageState,
    phase: Phase,
    loaded_once: bool,
    /// Page requested by the newest in-flight load.
    pending_page: Option<usize>,
    latest_request: Option<u64>,
    next_request: u64,
    completions: mpsc::WeakUnboundedSender<Command>,
}

impl<S: VisitDataSource> Actor<S> {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.recv().await {
            self.handle(command);
        }
        tracing::trace!(entity = %self.entity_id, "visits presenter stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(Snapshot {
                    phase: self.phase,
                    state: self.state,
                });
            }
            Command::Detach => {
                tracing::debug!(entity = %self.entity_id, "consumer detached");
                self.view = None;
                self.phase = Phase::Detached;
            }
            _ if self.phase == Phase::Detached => {
                tracing::debug!(entity = %self.entity_id, "presenter detached; ignoring");
            }
            Command::LoadPage(page) => {
                if let Phase::Loading { page: loading } = self.phase {
                    tracing::debug!(page, loading, "load already in flight; ignoring");
                } else if self.state.total_pages > 0 && page >= self.state.total_pages {
                    self.reject_out_of_range(page);
                } else {
                    self.issue_load(page);
                }
            }
            Command::Next => {
                let cursor = self.cursor();
                if cursor + 1 < self.state.total_pages {
                    self.issue_load(cursor + 1);
                } else {
                    tracing::trace!(cursor, "no next page");
                }
            }
            Command::Previous => {
                let cursor = self.cursor();
                if cursor > 0 {
                    self.issue_load(cursor - 1);
                } else {
                    tracing::trace!("no previous page");
                }
            }
            Command::RefreshPageCount => self.issue_page_count(),
            Command::PageLoaded {
                request,
                page,
                result,
            } => self.page_loaded(request, page, result),
            Command::PageCountLoaded(result) => self.page_count_loaded(result),
        }
    }

    /// Navigation starts from the newest requested page, else the loaded one.
    fn cursor(&self) -> usize {
        self.pending_page.unwrap_or(self.state.current_page)
    }

    fn issue_load(&mut self, page: usize) {
        let Some(completions) = self.completions.upgrade() else {
            return;
        };
        let request = self.next_request;
        self.next_request += 1;
        self.latest_request = Some(request);
        self.pending_page = Some(page);
        self.phase = Phase::Loading { page };
        tracing::debug!(entity = %self.entity_id, page, request, "loading visits page");

        let source = Arc::clone(&self.context.source);
        let loader = Arc::clone(&self.context.loader);
        let renderer = Arc::clone(&self.context.renderer);
        let config_name = self.context.config_name.clone();
        let entity_id = self.entity_id.clone();

        tokio::spawn(async move {
            let result =
                load_visits(source, loader, renderer, entity_id, config_name, page).await;
            let _ = completions.send(Command::PageLoaded {
                request,
                page,
                result,
            });
        });
    }

    fn issue_page_count(&mut self) {
        let Some(completions) = self.completions.upgrade() else {
            return;
        };
        let source = Arc::clone(&self.context.source);
        let entity_id = self.entity_id.clone();

        tokio::spawn(async move {
            let result = source.fetch_page_count(&entity_id).await;
            let _ = completions.send(Command::PageCountLoaded(result));
        });
    }

    fn page_loaded(&mut self, request: u64, page: usize, result: Result<VisitPage, LoadError>) {
        if self.latest_request != Some(request) {
            tracing::debug!(page, request, "superseded page load discarded");
            return;
        }
        self.latest_request = None;
        self.pending_page = None;

        if self.state.total_pages > 0 && page >= self.state.total_pages {
            self.phase = self.settled_phase();
            self.reject_out_of_range(page);
            return;
        }

        match result {
            Ok(loaded) => {
                self.state.current_page = page;
                self.loaded_once = true;
                self.phase = Phase::Loaded;
                self.notify(|view, _| view.display_visits(loaded));
                self.notify_page_state();
            }
            Err(err) => {
                tracing::warn!(entity = %self.entity_id, page, "failed to load visits: {err}");
                self.phase = self.settled_phase();
                self.notify(|view, _| view.load_failed(&err));
            }
        }
    }

    fn page_count_loaded(&mut self, result: Result<usize, DataFetchError>) {
        match result {
            Ok(total) => {
                self.state.total_pages = total;
                if total > 0 && self.state.current_page >= total {
                    self.state.current_page = total - 1;
                }
                if total > 0
                    && let Some(page) = self.pending_page
                    && page >= total
                {
                    // The in-flight load now points past the end; its completion is stale.
                    self.latest_request = None;
                    self.pending_page = None;
                    self.phase = self.settled_phase();
                    self.reject_out_of_range(page);
                }
                self.notify_page_state();
            }
            Err(err) => {
                tracing::warn!(entity = %self.entity_id, "failed to count visit pages: {err}");
                let err = LoadError::from(err);
                self.notify(|view, _| view.load_failed(&err));
            }
        }
    }

    /// Phase to fall back to once no load is in flight.
    fn settled_phase(&self) -> Phase {
        if self.loaded_once {
            Phase::Loaded
        } else {
            Phase::Idle
        }
    }

    fn reject_out_of_range(&mut self, page: usize) {
        let err = LoadError::OutOfRange {
            page,
            total: self.state.total_pages,
        };
        tracing::warn!(entity = %self.entity_id, "{err}");
        self.notify(|view, _| view.load_failed(&err));
    }

    fn notify_page_state(&mut self) {
        self.notify(|view, actor| {
            view.page_state_changed(actor.state, actor.page_counter());
        });
    }

    fn page_counter(&self) -> Option<String> {
        let renderer = &self.context.renderer;
        let template = renderer.labels().label(LabelId::PageCounter)?;
        let data = json!({
            "current": self.state.current_page + 1,
            "total": self.state.total_pages,
        });
        match renderer.templates().render(&template, &data) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!("page counter label failed: {err}");
                None
            }
        }
    }

    /// Call into the consumer if it is still alive; otherwise detach.
    fn notify(&mut self, deliver: impl FnOnce(&dyn VisitsView, &Self)) {
        match self.view.as_ref().and_then(Weak::upgrade) {
            Some(view) => deliver(view.as_ref(), self),
            None => {
                tracing::debug!(entity = %self.entity_id, "consumer expired; delivery dropped");
                self.view = None;
                self.phase = Phase::Detached;
            }
        }
    }
}

/// Fetch one page of records, then build its render list on the blocking pool.
async fn load_visits<S: VisitDataSource>(
    source: Arc<S>,
    loader: Arc<CachedConfigLoader>,
    renderer: Arc<VisitRenderer>,
    entity_id: String,
    config_name: String,
    page: usize,
) -> Result<VisitPage, LoadError> {
    let records = source.fetch_records(&entity_id, page).await?;

    tokio::task::spawn_blocking(move || -> Result<VisitPage, LoadError> {
        let document = loader.load(&config_name)?;
        let rows = renderer.assemble(&document, &records);
        Ok(VisitPage {
            page,
            records,
            rows,
        })
    })
    .await
    .map_err(|err| LoadError::Worker(err.to_string()))?
}
