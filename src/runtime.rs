//! Owns the [`Model`] on a tokio task and turns its commands into effects.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{Command, Model, Msg, ViewSnapshot};
use crate::constants::{EVENT_QUEUE_SIZE, MESSAGE_QUEUE_SIZE, PANEL_TICK};
use crate::feed::FeedSource;
use crate::link::LinkOpener;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("map runtime has shut down")]
pub struct RuntimeClosed;

/// Cheap, cloneable access to a running map.
#[derive(Clone)]
pub struct MapHandle {
    tx: mpsc::Sender<Msg>,
    view: watch::Receiver<ViewSnapshot>,
    events: broadcast::Sender<ViewSnapshot>,
}

impl MapHandle {
    pub async fn send(&self, msg: Msg) -> Result<(), RuntimeClosed> {
        self.tx.send(msg).await.map_err(|_| RuntimeClosed)
    }

    /// Latest published view.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ViewSnapshot> {
        self.view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewSnapshot> {
        self.events.subscribe()
    }
}

/// The running task. Dropping it also stops the runtime.
pub struct Runtime {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl Runtime {
    pub fn spawn(
        model: Model,
        feed: Arc<dyn FeedSource>,
        opener: Arc<dyn LinkOpener>,
    ) -> (Self, MapHandle) {
        let (tx, inbox) = mpsc::channel(MESSAGE_QUEUE_SIZE);
        let (view_tx, view_rx) = watch::channel(model.view());
        let (events, _) = broadcast::channel(EVENT_QUEUE_SIZE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = Driver {
            model,
            feed,
            opener,
            inbox,
            loopback: tx.clone(),
            view_tx,
            events: events.clone(),
            fetch: None,
            ticker: None,
        };
        let join = tokio::spawn(driver.run(shutdown_rx));

        let handle = MapHandle {
            tx,
            view: view_rx,
            events,
        };
        (
            Self {
                shutdown_tx: Some(shutdown_tx),
                join,
            },
            handle,
        )
    }

    /// Stop the loop, cancel the in-flight fetch and the frame ticker.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            warn!("map runtime ended abnormally: {}", e);
        }
    }
}

struct Driver {
    model: Model,
    feed: Arc<dyn FeedSource>,
    opener: Arc<dyn LinkOpener>,
    inbox: mpsc::Receiver<Msg>,
    loopback: mpsc::Sender<Msg>,
    view_tx: watch::Sender<ViewSnapshot>,
    events: broadcast::Sender<ViewSnapshot>,
    fetch: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        let startup = self.model.init();
        self.execute(startup);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                msg = self.inbox.recv() => {
                    let Some(msg) = msg else { break };
                    let commands = self.model.update(msg, Instant::now());
                    self.execute(commands);
                    self.stop_ticker_if_idle();
                }
            }
        }

        self.teardown();
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::FetchFeed => self.start_fetch(),
                Command::RequestFrames => self.start_ticker(),
                Command::OpenLink(url) => self.open_link(url),
                Command::Redraw => self.publish(),
            }
        }
    }

    fn start_fetch(&mut self) {
        if let Some(previous) = self.fetch.take() {
            previous.abort();
        }
        let feed = Arc::clone(&self.feed);
        let tx = self.loopback.clone();
        self.fetch = Some(tokio::spawn(async move {
            let result = feed.fetch().await;
            if tx.send(Msg::FeedLoaded(result)).await.is_err() {
                debug!("feed arrived after shutdown, dropped");
            }
        }));
    }

    fn start_ticker(&mut self) {
        if self.ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let tx = self.loopback.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PANEL_TICK);
            loop {
                interval.tick().await;
                if tx.send(Msg::Frame).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_ticker_if_idle(&mut self) {
        if self.model.panel().is_transitioning() {
            return;
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn open_link(&self, url: String) {
        let opener = Arc::clone(&self.opener);
        tokio::task::spawn_blocking(move || {
            if !opener.can_open(&url) {
                warn!("Don't know how to open URI: {}", url);
                return;
            }
            if let Err(e) = opener.open(&url) {
                warn!("{}", e);
            }
        });
    }

    fn publish(&self) {
        let snapshot = self.model.view();
        self.view_tx.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.events.send(snapshot);
    }

    fn teardown(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        info!("🛑 Map runtime stopped");
    }
}
