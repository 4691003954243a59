use tokio::sync::mpsc;
use visit_presenter::{LoadError, PageState, VisitPage, VisitsView};

/// What the presenter told the terminal.
#[derive(Debug)]
pub enum ViewEvent {
    Visits(VisitPage),
    PageState {
        state: PageState,
        counter: Option<String>,
    },
    Failed(String),
}

/// Consumer that forwards every presenter callback to the command loop.
pub struct ChannelView {
    events: mpsc::UnboundedSender<ViewEvent>,
}

impl ChannelView {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }

    fn forward(&self, event: ViewEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("command loop gone; presenter event dropped");
        }
    }
}

impl VisitsView for ChannelView {
    fn display_visits(&self, page: VisitPage) {
        self.forward(ViewEvent::Visits(page));
    }

    fn page_state_changed(&self, state: PageState, counter: Option<String>) {
        self.forward(ViewEvent::PageState { state, counter });
    }

    fn load_failed(&self, error: &LoadError) {
        self.forward(ViewEvent::Failed(error.to_string()));
    }
}
