//! Node assembly: store, pipeline, and worker lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ccn_chainsync::ChainTxSource;
use ccn_content::{ContentStorage, HttpContentStorage};
use ccn_store::Store;
use ccn_store_lmdb::LmdbStore;
use ccn_verifiers::Registry;

use crate::config::NodeConfig;
use crate::cron::run_cron;
use crate::gossip::run_gossip_listener;
use crate::metrics::NodeMetrics;
use crate::pipeline::Pipeline;
use crate::shutdown::ShutdownController;
use crate::workers::{run_chain_fetcher, run_pending_drain, run_tx_drain};
use crate::NodeError;

const CRON_TICK: Duration = Duration::from_secs(30);
const CHAIN_POLL: Duration = Duration::from_secs(15);

/// A running CCN node.
pub struct Node {
    config: NodeConfig,
    store: Arc<dyn Store>,
    pipeline: Arc<Pipeline>,
    metrics: Arc<NodeMetrics>,
    shutdown: ShutdownController,
    gossip_tx: mpsc::Sender<Vec<u8>>,
    gossip_rx: Option<mpsc::Receiver<Vec<u8>>>,
    tx_source: Option<Arc<dyn ChainTxSource>>,
    handles: Vec<JoinHandle<()>>,
}

impl Node {
    /// Open the store and assemble the pipeline with the HTTP content
    /// gateway from the configuration.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let content: Arc<dyn ContentStorage> = Arc::new(
            HttpContentStorage::new(
                config.content_gateway.clone(),
                Duration::from_secs(config.content_timeout_secs),
            )
            .map_err(|e| NodeError::Config(e.to_string()))?,
        );
        Self::with_content(config, content)
    }

    /// Assemble the node with an explicit content storage collaborator.
    pub fn with_content(
        config: NodeConfig,
        content: Arc<dyn ContentStorage>,
    ) -> Result<Self, NodeError> {
        let store: Arc<dyn Store> =
            Arc::new(LmdbStore::open(&config.data_dir, config.map_size)?);
        let registry = Registry::new(&config.chains);
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&store),
            registry,
            content,
            &config,
        ));
        let (gossip_tx, gossip_rx) = mpsc::channel(config.gossip_queue_size);

        Ok(Self {
            config,
            store,
            pipeline,
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: ShutdownController::new(),
            gossip_tx,
            gossip_rx: Some(gossip_rx),
            tx_source: None,
            handles: Vec::new(),
        })
    }

    /// Attach the chain transaction source collaborator. Without one, no
    /// chain fetchers run (gossip-only node).
    pub fn set_tx_source(&mut self, source: Arc<dyn ChainTxSource>) {
        self.tx_source = Some(source);
    }

    /// The sender the gossip transport delivers payloads into.
    pub fn gossip_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.gossip_tx.clone()
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Spawn every worker loop.
    pub fn start(&mut self) -> Result<(), NodeError> {
        let gossip_rx = self
            .gossip_rx
            .take()
            .ok_or_else(|| NodeError::Other("node already started".into()))?;

        self.handles.push(tokio::spawn(run_gossip_listener(
            gossip_rx,
            Arc::clone(&self.store),
            Arc::clone(&self.metrics),
            self.shutdown.listener(),
        )));

        let idle = Duration::from_secs(self.config.drain_interval_secs);
        for _ in 0..self.config.pipeline_workers.max(1) {
            self.handles.push(tokio::spawn(run_pending_drain(
                Arc::clone(&self.pipeline),
                Arc::clone(&self.metrics),
                self.config.batch_size,
                idle,
                self.shutdown.listener(),
            )));
        }

        self.handles.push(tokio::spawn(run_tx_drain(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.metrics),
            self.config.batch_size,
            idle,
            self.shutdown.listener(),
        )));

        if let Some(source) = &self.tx_source {
            for &chain in &self.config.chains {
                self.handles.push(tokio::spawn(run_chain_fetcher(
                    Arc::clone(&self.store),
                    Arc::clone(source),
                    chain,
                    CHAIN_POLL,
                    self.shutdown.listener(),
                )));
            }
        }

        self.handles.push(tokio::spawn(run_cron(
            Arc::clone(&self.store),
            CRON_TICK,
            self.shutdown.listener(),
        )));

        tracing::info!(
            workers = self.config.pipeline_workers,
            chains = self.config.chains.len(),
            "node started"
        );
        Ok(())
    }

    /// Signal shutdown and wait for every worker to finish its current
    /// item.
    pub async fn stop(&mut self) {
        self.shutdown.shutdown();
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!(%err, "worker ended abnormally");
            }
        }
        tracing::info!("node stopped");
    }

    /// Wait for an OS shutdown signal.
    pub async fn wait_for_signal(&self) {
        self.shutdown.wait_for_signal().await;
    }
}
