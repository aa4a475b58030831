//! Debounced, race-safe incremental search.
//!
//! One [`SearchEngine`] task per search surface owns all search state. Input
//! arrives as commands; the current [`SearchView`] is published on a watch
//! channel. Dispatches run as separate tasks and report back tagged with the
//! sequence number they were issued under. Only a response carrying the latest
//! issued number is applied, so an older query can never overwrite a newer one.
//!
//! ```text
//! Idle --query--> Debouncing --quiet period--> Dispatched --latest--> Idle
//!                    ^   |                          |
//!                    +---+ keystroke                +--stale--> (ignored)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};
use utoipa::ToSchema;
use uuid::Uuid;

use super::dispatcher::{SearchDispatcher, SearchOutcome};
use super::models::{SearchResult, SearchState};
use crate::features::catalog::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SearchPhase {
    #[default]
    Idle,
    /// Waiting for the input to stay unchanged for the debounce interval
    Debouncing,
    /// A query is in flight
    Dispatched,
}

/// Everything a search surface renders
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    /// Raw input text
    pub query: String,
    pub phase: SearchPhase,
    pub state: SearchState,
    /// Whether the result dropdown is shown
    pub open: bool,
    /// A dispatch is in flight
    pub searching: bool,
    /// Latest sequence number issued; responses tagged lower are discarded
    pub sequence: u64,
}

enum Command {
    Query(String),
    Clear,
    Dismiss,
    Select {
        kind: EntityKind,
        id: Uuid,
        reply: oneshot::Sender<Option<String>>,
    },
    Shutdown,
}

struct Response {
    sequence: u64,
    outcome: SearchOutcome,
}

/// Client side of a running engine. Dropping it stops the engine.
pub struct SearchHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SearchView>,
    task: JoinHandle<()>,
}

impl SearchHandle {
    /// New input text (every keystroke)
    pub fn query(&self, text: impl Into<String>) {
        self.send(Command::Query(text.into()));
    }

    /// Empty the input and the results
    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    /// Hide the dropdown and drop any pending or in-flight query
    pub fn dismiss(&self) {
        self.send(Command::Dismiss);
    }

    /// Pick a displayed result: resets the search and returns its navigation target.
    ///
    /// `None` when the result is not among those currently shown.
    pub async fn select(&self, kind: EntityKind, id: Uuid) -> Option<String> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::Select { kind, id, reply });
        answer.await.ok().flatten()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.view.clone()
    }

    pub fn view(&self) -> SearchView {
        self.view.borrow().clone()
    }

    /// Stop the engine and wait for it to finish
    pub async fn shutdown(self) {
        self.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            debug!("Search engine task ended abnormally: {}", e);
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            trace!("Search engine already stopped");
        }
    }
}

pub struct SearchEngine {
    dispatcher: Arc<SearchDispatcher>,
    debounce: Duration,
    view: watch::Sender<SearchView>,
    responses: mpsc::UnboundedSender<Response>,
    latest: u64,
    deadline: Option<Instant>,
    pending: Option<String>,
    results: Vec<SearchResult>,
}

impl SearchEngine {
    pub fn spawn(dispatcher: Arc<SearchDispatcher>) -> SearchHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SearchView::default());

        let engine = SearchEngine {
            debounce: dispatcher.config().debounce,
            dispatcher,
            view: view_tx,
            responses: responses_tx,
            latest: 0,
            deadline: None,
            pending: None,
            results: Vec::new(),
        };
        let task = tokio::spawn(engine.run(commands_rx, responses_rx));

        SearchHandle {
            commands: commands_tx,
            view: view_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut responses: mpsc::UnboundedReceiver<Response>,
    ) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(response) = responses.recv() => self.apply(response),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire();
                }
            }
        }
        debug!("Search engine stopped at sequence {}", self.latest);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Query(text) => self.on_query(text),
            Command::Clear => {
                self.view.send_modify(|v| v.query.clear());
                self.reset();
            }
            Command::Dismiss => {
                self.invalidate();
                self.view.send_modify(|v| {
                    v.open = false;
                    v.searching = false;
                    v.phase = SearchPhase::Idle;
                    v.sequence = self.latest;
                });
            }
            Command::Select { kind, id, reply } => {
                let target = self
                    .results
                    .iter()
                    .find(|r| r.kind() == kind && r.id() == id)
                    .map(SearchResult::href);
                if target.is_some() {
                    self.view.send_modify(|v| v.query.clear());
                    self.reset();
                }
                let _ = reply.send(target);
            }
            Command::Shutdown => {}
        }
    }

    fn on_query(&mut self, text: String) {
        let accepted = self.dispatcher.accept(&text);
        self.view.send_modify(|v| v.query = text);

        match accepted {
            None => self.reset(),
            Some(query) => {
                // each keystroke restarts the quiet period
                self.pending = Some(query);
                self.deadline = Some(Instant::now() + self.debounce);
                self.view.send_modify(|v| v.phase = SearchPhase::Debouncing);
            }
        }
    }

    /// Debounce elapsed: issue the pending query under a fresh sequence number
    fn fire(&mut self) {
        self.deadline = None;
        let Some(query) = self.pending.take() else {
            return;
        };

        self.latest += 1;
        let sequence = self.latest;
        self.view.send_modify(|v| {
            v.phase = SearchPhase::Dispatched;
            v.searching = true;
            v.sequence = sequence;
        });
        debug!("Dispatching search #{} for '{}'", sequence, query);

        let dispatcher = self.dispatcher.clone();
        let responses = self.responses.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&query).await;
            // the engine may be gone; nothing left to notify
            let _ = responses.send(Response { sequence, outcome });
        });
    }

    fn apply(&mut self, response: Response) {
        if response.sequence != self.latest {
            debug!(
                "Discarding stale search #{} (latest #{})",
                response.sequence, self.latest
            );
            return;
        }

        let state = response.outcome.state();
        self.results = response.outcome.results;
        let phase = if self.deadline.is_some() {
            SearchPhase::Debouncing
        } else {
            SearchPhase::Idle
        };
        self.view.send_modify(|v| {
            v.state = state;
            v.open = true;
            v.searching = false;
            v.phase = phase;
        });
    }

    /// Make every pending or in-flight query a no-op
    fn invalidate(&mut self) {
        self.latest += 1;
        self.deadline = None;
        self.pending = None;
    }

    /// Back to `NotSearched`, hidden, nothing pending
    fn reset(&mut self) {
        self.invalidate();
        self.results.clear();
        let sequence = self.latest;
        self.view.send_modify(|v| {
            v.state = SearchState::NotSearched;
            v.open = false;
            v.searching = false;
            v.phase = SearchPhase::Idle;
            v.sequence = sequence;
        });
    }
}
