//! The fetch service: startup, supervision, and graceful teardown.
//!
//! [`Service`] owns the three-stage pipeline (discovery → download pool →
//! enqueuer) plus the exiter task that serializes teardown. The only shared
//! mutable state is the activity flag, the once-guarded quit signal, and the
//! worker tracker; everything else flows through channels.
//!
//! # Teardown
//!
//! Teardown is driven by a single one-shot quit signal carrying a `force`
//! flag. Forced teardown (user shutdown, any fatal error) cancels the root
//! token and so aborts in-flight store requests; non-forced teardown (normal
//! end of discovery) lets them finish. The exiter then winds the stages down
//! strictly in pipeline order: discovery first, then the downloaders, then
//! the enqueuer, and finally releases the store client and fires the
//! shutdown callback. Each stage's channel closes when the stage ahead of it
//! drops its senders, so reordering these waits is impossible without
//! leaking a sender.

use crate::{
    config::FetcherConfig,
    discovery::Discoverer,
    download::Downloader,
    enqueue::Enqueuer,
    error::{FetchError, FetchResult},
    ledger::{BlockSink, Ledger},
};
use blockfetch_store::{HttpStoreConnector, ObjectStore, StoreConnect};
use blockfetch_types::{Block, Oid};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

type ShutdownCallback = Box<dyn FnOnce() + Send + 'static>;

/// Requests service teardown, exactly once.
///
/// Every pipeline task holds a clone; whichever observes a terminal
/// condition first wins, later requests are ignored.
#[derive(Clone)]
pub(crate) struct StopHandle {
    quit: mpsc::Sender<bool>,
    once: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request teardown. `force` aborts in-flight store requests.
    pub(crate) fn stop(&self, force: bool) {
        if !self.once.swap(true, Ordering::SeqCst) {
            // Capacity-one channel and a single guarded send: cannot fail
            // while the exiter side is alive.
            let _ = self.quit.try_send(force);
        }
    }
}

/// Block-fetching service.
///
/// Fetches a chain's archived blocks out of a content-addressed object
/// store and hands them to a [`BlockSink`] in discovery order. The service
/// is single-use: once torn down it cannot be started again.
///
/// See the crate docs for the pipeline layout and an end-to-end example.
pub struct Service<C, L, Q>
where
    C: StoreConnect,
    L: Ledger,
    Q: BlockSink,
{
    cfg: FetcherConfig,
    state_root_in_header: bool,
    chain: Arc<L>,
    sink: Arc<Q>,
    connector: C,

    active: Arc<AtomicBool>,
    consumed: Arc<AtomicBool>,
    stop: StopHandle,
    quit_rx: Mutex<Option<mpsc::Receiver<bool>>>,

    root: CancellationToken,
    discovery_stop: CancellationToken,
    shutdown_done: CancellationToken,
    shutdown_callback: Mutex<Option<ShutdownCallback>>,
}

impl<C, L, Q> std::fmt::Debug for Service<C, L, Q>
where
    C: StoreConnect,
    L: Ledger,
    Q: BlockSink,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("active", &self.is_active())
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl<L, Q> Service<HttpStoreConnector, L, Q>
where
    L: Ledger,
    Q: BlockSink,
{
    /// Build a service backed by the HTTP gateway named in the
    /// configuration.
    ///
    /// Resolves the store account from the configured wallet (the password
    /// is tried against each account and the first that decrypts wins), or
    /// generates an ephemeral account when no wallet is set. The first
    /// configured address is the endpoint dialed at [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns configuration validation and wallet errors synchronously.
    pub fn with_http_store(
        cfg: FetcherConfig,
        chain: L,
        sink: Q,
        shutdown_callback: impl FnOnce() + Send + 'static,
    ) -> FetchResult<Self> {
        let cfg = cfg.normalized()?;
        let account = cfg.resolve_account()?;
        let Some(endpoint) = cfg.addresses.first() else {
            return Err(crate::config::ConfigError::NoAddresses.into());
        };
        let connector =
            HttpStoreConnector::new(endpoint.clone(), cfg.container_id.clone(), account);
        Self::new(cfg, chain, sink, connector, shutdown_callback)
    }
}

impl<C, L, Q> Service<C, L, Q>
where
    C: StoreConnect,
    L: Ledger,
    Q: BlockSink,
{
    /// Create a new fetch service.
    ///
    /// Normalizes and validates the configuration and reads the chain
    /// configuration once. No tasks run until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] when the configuration is invalid.
    pub fn new(
        cfg: FetcherConfig,
        chain: L,
        sink: Q,
        connector: C,
        shutdown_callback: impl FnOnce() + Send + 'static,
    ) -> FetchResult<Self> {
        let cfg = cfg.normalized()?;
        let chain = Arc::new(chain);
        let state_root_in_header = chain.chain_info().state_root_in_header;

        let (quit_tx, quit_rx) = mpsc::channel(1);

        Ok(Self {
            cfg,
            state_root_in_header,
            chain,
            sink: Arc::new(sink),
            connector,
            active: Arc::new(AtomicBool::new(false)),
            consumed: Arc::new(AtomicBool::new(false)),
            stop: StopHandle { quit: quit_tx, once: Arc::new(AtomicBool::new(false)) },
            quit_rx: Mutex::new(Some(quit_rx)),
            root: CancellationToken::new(),
            discovery_stop: CancellationToken::new(),
            shutdown_done: CancellationToken::new(),
            shutdown_callback: Mutex::new(Some(Box::new(shutdown_callback))),
        })
    }

    /// Start the service.
    ///
    /// Idempotent: a second call while the service is active is a no-op
    /// returning success. Connects to the object store first; on connection
    /// failure the service is returned to the inactive state and the error
    /// is reported.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Connect`] when the store cannot be reached and
    /// [`FetchError::Consumed`] when the service has already been torn
    /// down.
    pub async fn start(&self) -> FetchResult<()> {
        if self.consumed.load(Ordering::SeqCst) {
            return Err(FetchError::Consumed);
        }
        if self.active.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Ok(());
        }
        info!("starting block fetcher service");

        let store = match self.connector.connect().await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                let _ = self.active.compare_exchange(
                    true,
                    false,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                return Err(FetchError::Connect(Box::new(err)));
            }
        };

        let Some(quit_rx) = self.quit_rx.lock().await.take() else {
            let _ =
                self.active.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst);
            return Err(FetchError::Consumed);
        };
        let callback = self.shutdown_callback.lock().await.take();

        // Identifier buffer holds two full discovery batches so the next
        // batch can stage while the current one downloads; the block buffer
        // holds one batch so short enqueue stalls do not idle the workers.
        let (oids_tx, oids_rx) = mpsc::channel::<Oid>(2 * self.cfg.oid_batch_size);
        let (blocks_tx, blocks_rx) = mpsc::channel::<Block>(self.cfg.oid_batch_size);

        let discoverer = Discoverer {
            store: store.clone(),
            timeout: self.cfg.timeout,
            oid_batch_size: self.cfg.oid_batch_size,
            index_file_size: self.cfg.index_file_size,
            index_file_attribute: self.cfg.index_file_attribute.clone(),
            block_attribute: self.cfg.block_attribute.clone(),
            skip_index_files_search: self.cfg.skip_index_files_search,
            height: self.chain.block_height(),
            oids: oids_tx,
            stop: self.discovery_stop.clone(),
            root: self.root.clone(),
        };
        let discoverer = tokio::spawn(discoverer.run(self.stop.clone()));

        let workers = TaskTracker::new();
        let oids_rx = Arc::new(Mutex::new(oids_rx));
        for _ in 0..self.cfg.downloader_workers_count {
            let downloader = Downloader {
                store: store.clone(),
                timeout: self.cfg.timeout,
                state_root_in_header: self.state_root_in_header,
                oids: oids_rx.clone(),
                blocks: blocks_tx.clone(),
                root: self.root.clone(),
                stop: self.stop.clone(),
            };
            workers.spawn(downloader.run());
        }
        // The workers hold the only block senders from here on.
        drop(blocks_tx);

        let enqueuer = Enqueuer {
            sink: self.sink.clone(),
            blocks: blocks_rx,
            root: self.root.clone(),
            stop: self.stop.clone(),
        };
        let enqueuer = tokio::spawn(enqueuer.run());

        let exiter = Exiter {
            quit_rx,
            root: self.root.clone(),
            discovery_stop: self.discovery_stop.clone(),
            discoverer,
            workers,
            enqueuer,
            store,
            active: self.active.clone(),
            consumed: self.consumed.clone(),
            callback,
            shutdown_done: self.shutdown_done.clone(),
        };
        tokio::spawn(exiter.run());

        Ok(())
    }

    /// Stop the service and wait for teardown to complete.
    ///
    /// Cancels all in-flight store requests, drains the pipeline, releases
    /// the store client, and fires the shutdown callback. A no-op when the
    /// service is not active. Safe to call from multiple tasks; all of them
    /// return once teardown finishes.
    pub async fn shutdown(&self) {
        if !self.is_active() {
            return;
        }
        self.stop.stop(true);
        self.shutdown_done.cancelled().await;
    }

    /// Whether the service is running or mid-teardown.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Teardown driver.
///
/// Waits for the one-shot quit signal and winds the pipeline down in stage
/// order. The order is a contract: each stage's input channel closes only
/// when every task of the stage ahead has returned and dropped its sender.
struct Exiter<S: ObjectStore> {
    quit_rx: mpsc::Receiver<bool>,
    root: CancellationToken,
    discovery_stop: CancellationToken,
    discoverer: JoinHandle<()>,
    workers: TaskTracker,
    enqueuer: JoinHandle<()>,
    store: Arc<S>,
    active: Arc<AtomicBool>,
    consumed: Arc<AtomicBool>,
    callback: Option<ShutdownCallback>,
    shutdown_done: CancellationToken,
}

impl<S: ObjectStore> Exiter<S> {
    async fn run(mut self) {
        // The quit signal may come from anyone, but only once. A closed
        // channel means every holder of the service is gone; treat that as
        // a forced stop.
        let force = self.quit_rx.recv().await.unwrap_or(true);
        info!(force, "shutting down block fetcher service");

        // Abort in-flight object reads and searches when the stop was
        // forced by the user or by a pipeline error.
        if force {
            self.root.cancel();
        }

        // Stop discovery and wait for it to return; its identifier sender
        // drops with it, closing the identifier channel.
        self.discovery_stop.cancel();
        let _ = self.discoverer.await;

        // Wait for the downloaders to drain the identifier channel. Their
        // block senders drop as they return, closing the block channel.
        self.workers.close();
        self.workers.wait().await;

        // Wait for the enqueuer to drain the block channel.
        let _ = self.enqueuer.await;

        // Everything is down: release the store client, flip the activity
        // marker, and let the owner know.
        self.store.close().await;
        self.consumed.store(true, Ordering::SeqCst);
        let _ = self.active.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst);
        if let Some(callback) = self.callback.take() {
            callback();
        }

        // Wake any user-initiated shutdown waiting for completion.
        self.shutdown_done.cancel();
    }
}
