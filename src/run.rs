//! Wiring of config, source, warehouse and state store into runs.

use anyhow::{Context, Result};
use checkpoint::WatermarkStore;
use std::sync::Arc;
use std::time::Duration;
use sync_engine::{EngineSettings, RunResult, SourceReader, SyncEngine, WarehouseSink};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warehouse_sync_bigquery_sink::BigQuerySink;
use warehouse_sync_mysql_source::{sanitize_connection_string, MySqlSource};

use crate::config::Config;
use crate::report::write_report;

/// Cancels a token once a deadline passes. Dropping the guard disarms it.
pub struct TimeoutGuard(Option<JoinHandle<()>>);

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

pub fn arm_timeout(cancel: &CancellationToken, timeout: Option<Duration>) -> TimeoutGuard {
    TimeoutGuard(timeout.map(|timeout| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("Run exceeded its timeout of {:?}, cancelling", timeout);
            cancel.cancel();
        })
    }))
}

pub struct App<S: SourceReader, D: WarehouseSink> {
    config: Config,
    source: Arc<S>,
    sink: Arc<D>,
    store: Arc<dyn WatermarkStore>,
    settings: EngineSettings,
    run_timeout: Option<Duration>,
}

impl App<MySqlSource, BigQuerySink> {
    /// Connect to MySQL, BigQuery and the state store named in `config`.
    pub async fn connect(config: Config) -> Result<Self> {
        info!(
            "Connecting to MySQL at {}",
            sanitize_connection_string(&config.source.url)
        );
        let source = MySqlSource::new(&config.source.url)?;
        let sink = BigQuerySink::connect(&config.destination).await?;
        sink.ensure_dataset()
            .await
            .context("Failed to prepare destination dataset")?;
        let store = config.state.build().await?;
        Self::new(config, Arc::new(source), Arc::new(sink), store)
    }
}

impl<S: SourceReader, D: WarehouseSink> App<S, D> {
    pub fn new(
        config: Config,
        source: Arc<S>,
        sink: Arc<D>,
        store: Arc<dyn WatermarkStore>,
    ) -> Result<Self> {
        let settings = config.engine_settings()?;
        let run_timeout = config.run_timeout()?;
        Ok(Self {
            config,
            source,
            sink,
            store,
            settings,
            run_timeout,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn engine(&self, cancel: CancellationToken) -> SyncEngine<S, D> {
        SyncEngine::new(
            self.source.clone(),
            self.sink.clone(),
            self.store.clone(),
            self.settings.clone(),
        )
        .with_cancellation(cancel)
    }

    /// One incremental pass over every configured mapping, bounded by
    /// `sync.run_timeout`.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> Vec<RunResult> {
        let cancel = shutdown.child_token();
        let _timeout = arm_timeout(&cancel, self.run_timeout);
        let results = self.engine(cancel).run_once(&self.config.mappings).await;
        self.finish(&results);
        results
    }

    /// Reload `[start, end]` for one mapping, or from `start` up to the run
    /// start when `end` is `None`. The stored watermark is not touched.
    pub async fn backfill(
        &self,
        mapping: &str,
        start: &str,
        end: Option<&str>,
        shutdown: &CancellationToken,
    ) -> Result<RunResult> {
        let mapping = self
            .config
            .mapping(mapping)
            .ok_or_else(|| anyhow::anyhow!("Mapping not found: {mapping}"))?;

        let cancel = shutdown.child_token();
        let _timeout = arm_timeout(&cancel, self.run_timeout);
        let result = self.engine(cancel).run_backfill(mapping, start, end).await;
        self.finish(std::slice::from_ref(&result));
        Ok(result)
    }

    fn finish(&self, results: &[RunResult]) {
        for result in results {
            info!("{}", result.summary());
        }
        match write_report(results, &self.config.report.directory) {
            Ok(path) => info!("Wrote run report to {}", path.display()),
            Err(e) => warn!("Failed to write run report: {e:#}"),
        }
    }
}
