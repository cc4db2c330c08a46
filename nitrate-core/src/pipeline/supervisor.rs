//! Wires Scanner, Producer, and the Worker pool into background tasks
//! sharing one queue and one config snapshot, with cooperative shutdown
//! (SPEC_FULL.md §5 "Cancellation", A3).

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::producer::Producer;
use super::scanner::Scanner;
use super::status::StatusManager;
use super::worker::Worker;
use crate::config::RuntimeConfig;
use crate::db::Repository;
use crate::resolver::Resolve;

const QUEUE_CAPACITY: usize = 256;

pub struct Supervisor {
    pub shutdown: CancellationToken,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Supervisor {
    /// Spawn the Scanner, Producer, and `config.worker_count` Workers as
    /// background tasks. Reads `config.worker_count` from the snapshot
    /// present at spawn time; a worker-count change on reload takes effect
    /// only on restart, same as ferrex's own service bootstrap. The
    /// resolver is taken as a `watch::Receiver` so a config reload can swap
    /// in a freshly built provider client (new concurrency/language) for
    /// every running worker without a restart.
    pub fn spawn(
        repo: Repository,
        resolver: watch::Receiver<Arc<dyn Resolve>>,
        config: watch::Receiver<Arc<RuntimeConfig>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::new();

        let worker_count = config.borrow().worker_count.max(1);
        let status = StatusManager::new(repo.clone());
        for id in 0..worker_count {
            let worker = Worker::new(id, repo.clone(), status.clone(), resolver.clone());
            let queue = rx.clone();
            let config = config.clone();
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                tokio::select! {
                    _ = worker.run(queue, config) => {}
                    _ = token.cancelled() => {}
                }
            }));
        }

        {
            let repo = repo.clone();
            let config = config.clone();
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                scanner_loop(Scanner::new(repo), config, token).await;
            }));
        }

        {
            let producer = Producer::new(repo, tx);
            let config = config.clone();
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                producer_loop(producer, config, token).await;
            }));
        }

        Self { shutdown, handles }
    }

    /// Cancel all background tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn scanner_loop(scanner: Scanner, config: watch::Receiver<Arc<RuntimeConfig>>, token: CancellationToken) {
    loop {
        let snapshot = config.borrow().clone();
        tokio::select! {
            result = scanner.tick(&snapshot) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "scanner tick failed");
                }
            }
            _ = token.cancelled() => return,
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(snapshot.scan_interval_seconds)) => {}
            _ = token.cancelled() => return,
        }
    }
}

async fn producer_loop(producer: Producer, config: watch::Receiver<Arc<RuntimeConfig>>, token: CancellationToken) {
    let mut interval_secs = config.borrow().producer_interval_seconds;
    loop {
        let snapshot = config.borrow().clone();
        let outcome = tokio::select! {
            result = producer.tick(snapshot.producer_batch_size) => Some(result),
            _ = token.cancelled() => None,
        };

        match outcome {
            Some(Ok(_)) => interval_secs = snapshot.producer_interval_seconds,
            Some(Err(e)) => {
                tracing::error!(error = %e, "producer tick failed, backing off");
                interval_secs = (interval_secs * 2).max(snapshot.producer_interval_seconds);
            }
            None => return,
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval_secs)) => {}
            _ = token.cancelled() => return,
        }
    }
}
