//! Crawl worker: pulls one URL at a time from the frontier, processes it,
//! and publishes whatever it discovers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::classify::{self, ResourceKind};
use crate::context::CrawlContext;
use crate::extract;
use crate::fetch::FetchError;
use crate::manager::LinkQueue;
use crate::storage;

/// Nap length while the outbox waits for the manager's sweep.
const OUTBOX_WAIT: Duration = Duration::from_micros(100);

/// Worker state shared with the manager.
///
/// The manager drains `outbox` and `errors` and flips `running`; the worker
/// mutates everything else. A worker with a non-empty outbox refuses to
/// dequeue, so by the time the manager sees it idle, every discovery has
/// been delivered.
#[derive(Default)]
pub struct WorkerShared {
    outbox: Mutex<HashSet<String>>,
    errors: Mutex<HashSet<String>>,
    working: AtomicBool,
    running: AtomicBool,
}

impl WorkerShared {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    pub(crate) fn set_working(&self, working: bool) {
        self.working.store(working, Ordering::SeqCst);
    }

    /// Ask the worker to exit; it complies within one poll timeout.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Atomically take everything the worker has discovered so far.
    pub fn drain_outbox(&self) -> HashSet<String> {
        std::mem::take(&mut *self.outbox.lock().unwrap())
    }

    /// Atomically take the URLs whose retry budget is spent.
    pub fn drain_errors(&self) -> HashSet<String> {
        std::mem::take(&mut *self.errors.lock().unwrap())
    }

    fn outbox_empty(&self) -> bool {
        self.outbox.lock().unwrap().is_empty()
    }

    fn publish(&self, links: HashSet<String>) {
        self.outbox.lock().unwrap().extend(links);
    }

    fn record_error(&self, link: &str) {
        self.errors.lock().unwrap().insert(link.to_string());
    }
}

pub struct Worker {
    id: usize,
    ctx: Arc<CrawlContext>,
    queue: Arc<LinkQueue>,
    shared: Arc<WorkerShared>,
}

impl Worker {
    pub fn new(
        id: usize,
        ctx: Arc<CrawlContext>,
        queue: Arc<LinkQueue>,
        shared: Arc<WorkerShared>,
    ) -> Self {
        Self {
            id,
            ctx,
            queue,
            shared,
        }
    }

    pub async fn run(self) {
        debug!("worker-{} start", self.id);
        while self.shared.is_running() {
            // Hold off on new work until the manager has swept the outbox;
            // the termination check depends on this ordering.
            if !self.shared.outbox_empty() {
                tokio::time::sleep(OUTBOX_WAIT).await;
                continue;
            }
            match self
                .queue
                .claim_timeout(self.ctx.config.link_poll_timeout, &self.shared)
                .await
            {
                Some(link) => {
                    let found = self.handle(&link).await;
                    self.shared.publish(found);
                }
                None => self.shared.set_working(false),
            }
        }
        debug!("worker-{} end", self.id);
    }

    async fn handle(&self, link: &str) -> HashSet<String> {
        info!("worker-{} handle\t{link}", self.id);
        match classify::classify(link) {
            ResourceKind::Binary => {
                self.download(link).await;
                HashSet::new()
            }
            kind => self.handle_text(link, kind).await,
        }
    }

    async fn download(&self, link: &str) {
        if let Err(e) = self.ctx.fetcher.download(link).await {
            if matches!(e, FetchError::Exhausted { .. }) {
                self.shared.record_error(link);
            }
        }
    }

    /// Fetch a page or stylesheet, collect its outbound links, rewrite them
    /// to relative local paths, and save the result.
    async fn handle_text(&self, link: &str, kind: ResourceKind) -> HashSet<String> {
        let document = match self.ctx.fetcher.fetch_text(link).await {
            Ok(document) => document,
            Err(FetchError::Exhausted { .. }) => {
                self.shared.record_error(link);
                return HashSet::new();
            }
            // Already logged by the fetcher; not worth a retry.
            Err(FetchError::Decode) => return HashSet::new(),
        };

        let config = &self.ctx.config;
        let raw = match kind {
            ResourceKind::Css => extract::extract_css_links(&document.text),
            _ => extract::extract_html_links(&document.text),
        };
        let valid: Vec<String> = raw
            .into_iter()
            .filter(|candidate| classify::in_scope(candidate, &config.site_host))
            .collect();
        let outbound: HashSet<String> = valid
            .iter()
            .map(|candidate| {
                extract::resolve_link(link, &extract::normalize_link(candidate, config))
            })
            .collect();

        let text = extract::rewrite_links(document.text, &valid, link, config);
        if let Err(e) = storage::save_text_file(&config.home_dir, link, &text, document.encoding) {
            error!("[{e}]\t{link}");
        }
        outbound
    }
}
