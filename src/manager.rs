//! Crawl orchestration: the shared frontier, the worker pool, and the
//! termination protocol.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::context::CrawlContext;
use crate::worker::{Worker, WorkerShared};

/// Pacing of the manager's sweep over worker outboxes.
const SWEEP_INTERVAL: Duration = Duration::from_micros(100);

/// Pacing of a worker's poll against an empty frontier.
const QUEUE_POLL: Duration = Duration::from_millis(20);

/// Links at or above this length are dropped on admission.
const MAX_LINK_LEN: usize = 250;

/// Shared FIFO of pending URLs. Workers claim from it; only the manager
/// pushes to it.
pub struct LinkQueue {
    inner: Mutex<VecDeque<String>>,
}

impl LinkQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, link: String) {
        self.inner.lock().unwrap().push_back(link);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Claim the next link. The worker's `working` flag flips inside the
    /// queue's critical section, so the manager can never observe an empty
    /// queue together with an idle worker that is actually mid-claim.
    fn try_claim(&self, shared: &WorkerShared) -> Option<String> {
        let mut queue = self.inner.lock().unwrap();
        let link = queue.pop_front()?;
        shared.set_working(true);
        Some(link)
    }

    /// Poll for a link until `timeout` elapses.
    pub(crate) async fn claim_timeout(
        &self,
        timeout: Duration,
        shared: &WorkerShared,
    ) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(link) = self.try_claim(shared) {
                return Some(link);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(QUEUE_POLL).await;
        }
    }
}

impl Default for LinkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished crawl looked like.
#[derive(Debug)]
pub struct CrawlStats {
    /// Distinct URLs ever admitted to the frontier.
    pub links_seen: usize,
    /// URLs that exhausted their retry budget in both phases.
    pub failed: Vec<String>,
}

struct WorkerHandle {
    shared: Arc<WorkerShared>,
    task: JoinHandle<()>,
}

/// Owns the frontier and the worker pool.
///
/// Workers never touch the `seen` set; they publish discoveries into their
/// outboxes and the manager alone decides what enters the queue. The crawl
/// ends when the queue is empty and every worker reports idle, with one
/// shot at re-running the URLs that failed their retry budget on a reduced
/// pool.
pub struct Manager {
    ctx: Arc<CrawlContext>,
    queue: Arc<LinkQueue>,
    seen: HashSet<String>,
    workers: Vec<WorkerHandle>,
}

impl Manager {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self {
            ctx,
            queue: Arc::new(LinkQueue::new()),
            seen: HashSet::new(),
            workers: Vec::new(),
        }
    }

    /// Run the crawl to completion.
    pub async fn run(mut self) -> anyhow::Result<CrawlStats> {
        let config = self.ctx.config.clone();
        std::fs::create_dir_all(&config.home_dir)
            .with_context(|| format!("creating {}", config.home_dir.display()))?;
        info!(
            "mirroring {} with {} workers into {}",
            config.root_url,
            config.thread_count,
            config.home_dir.display()
        );

        for id in 0..config.thread_count {
            let shared = Arc::new(WorkerShared::new());
            let worker = Worker::new(id, self.ctx.clone(), self.queue.clone(), shared.clone());
            let task = tokio::spawn(worker.run());
            self.workers.push(WorkerHandle { shared, task });
        }

        self.seen.insert(config.root_url.clone());
        self.queue.push(config.root_url.clone());

        let mut retry_spent = false;
        let failed = loop {
            self.sweep_outboxes();
            if self.queue.is_empty() && self.all_idle() {
                let errors = self.drain_errors();
                if errors.is_empty() {
                    break Vec::new();
                }
                if retry_spent {
                    let mut failed: Vec<String> = errors.into_iter().collect();
                    failed.sort();
                    break failed;
                }
                retry_spent = true;
                self.reduce_pool_and_requeue(errors).await;
            }
            tokio::time::sleep(SWEEP_INTERVAL).await;
        };

        self.shutdown().await;
        info!(
            "finish: {} links seen, {} failed",
            self.seen.len(),
            failed.len()
        );
        Ok(CrawlStats {
            links_seen: self.seen.len(),
            failed,
        })
    }

    fn sweep_outboxes(&mut self) {
        let mut discovered: Vec<String> = Vec::new();
        for handle in &self.workers {
            discovered.extend(handle.shared.drain_outbox());
        }
        for link in discovered {
            self.admit(link);
        }
    }

    /// Frontier admission: fragment strip, length cap, root-substring
    /// scope, dedup against `seen`.
    fn admit(&mut self, mut link: String) {
        if let Some(idx) = link.find('#') {
            if idx > 0 {
                link.truncate(idx);
            }
        }
        if link.len() >= MAX_LINK_LEN {
            return;
        }
        if !link.contains(self.ctx.config.root_url.as_str()) {
            return;
        }
        if self.seen.insert(link.clone()) {
            debug!("enqueue\t{link}");
            self.queue.push(link);
        }
    }

    fn all_idle(&self) -> bool {
        self.workers.iter().all(|handle| !handle.shared.is_working())
    }

    fn drain_errors(&self) -> HashSet<String> {
        self.workers
            .iter()
            .flat_map(|handle| handle.shared.drain_errors())
            .collect()
    }

    /// One-shot retry phase: keep a few workers, wait the rest out, then
    /// requeue every URL that exhausted its budget.
    async fn reduce_pool_and_requeue(&mut self, errors: HashSet<String>) {
        let keep = self.ctx.config.retry_thread_count.min(self.workers.len());
        info!(
            "pool reduced to {keep} workers; retrying {} failed links",
            errors.len()
        );
        for handle in &self.workers[keep..] {
            handle.shared.stop();
        }
        for handle in self.workers.split_off(keep) {
            let _ = handle.task.await;
        }
        for link in errors {
            self.queue.push(link);
        }
    }

    async fn shutdown(&mut self) {
        for handle in &self.workers {
            handle.shared.stop();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.task.await;
        }
    }
}
