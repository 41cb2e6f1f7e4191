//! # Sync Orchestrator
//!
//! Runs batched synchronization between Verial and WooCommerce, one batch
//! per `process_next_batch` call.
//!
//! ## Run Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   start_sync ──► RUNNING ──┬── process_next_batch ──► (next batch)     │
//! │   (validates config,       │                                            │
//! │    one run per entity)     ├── fewer records than requested ─► COMPLETED│
//! │                            ├── cancel flag seen at batch start ► CANCELLED
//! │                            ├── fetch exhausts retries ──────► FAILED   │
//! │                            └── complete(run, success) ──► COMPLETED /  │
//! │                                                              FAILED    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## One Batch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. plan range from the cursor                                          │
//! │       overlaps a bad range ──► record `range_skipped`, jump the cursor │
//! │  2. fetch (retry + timeout)                                             │
//! │  3. per record: map ──► [tariff price] ──► write (retry + timeout)     │
//! │       failure ──► item error, batch continues                           │
//! │  4. commit cursor + counters + item errors in one transaction           │
//! │  5. emit progress / status                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The per-batch [`BatchCache`] is created in step 1 and dropped after step 4.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use verial_core::{
    resolve_price, BadRange, BatchOutcome, BatchRange, BatchRangeCalculator, EntityType,
    ExternalRecord, ItemError, NormalizedProduct, PriceResolution, ProductOverrides, RangePlan,
    RunCounters, RunStatus, SyncDirection, SyncFilters, SyncRun, SyncStatusReport,
    ValidationError, RANGE_SKIPPED_REASON,
};
use verial_db::{Database, RunProgress, SyncRunRepository};

use crate::cache::BatchCache;
use crate::category::CategoryResolver;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::mapper::{CustomerMapper, OrderMapper, ProductMapper};
use crate::ports::{ErpClient, NoOpEmitter, PlatformWriter, SyncEventEmitter, WriteOutcome};
use crate::retry::RetryPolicy;

/// Fields tried, in order, to label an item error.
const ITEM_LABEL_FIELDS: &[&str] = &["ReferenciaBarras", "sku", "Id", "id"];

// =============================================================================
// Sync Orchestrator
// =============================================================================

/// Drives sync runs. Cheap to share behind an `Arc`.
pub struct SyncOrchestrator {
    config: Arc<SyncConfig>,
    runs: SyncRunRepository,
    erp: Arc<dyn ErpClient>,
    platform: Arc<dyn PlatformWriter>,
    emitter: Arc<dyn SyncEventEmitter>,
    calculator: BatchRangeCalculator,
    retry: RetryPolicy,
    products: ProductMapper,
    orders: OrderMapper,
    customers: CustomerMapper,
    /// Host overrides keyed by sku.
    overrides: HashMap<String, ProductOverrides>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator.
    ///
    /// The configuration is validated by `start_sync`, not here, so a host
    /// can still read status reports with an incomplete configuration.
    pub fn new(
        config: Arc<SyncConfig>,
        db: Arc<Database>,
        erp: Arc<dyn ErpClient>,
        platform: Arc<dyn PlatformWriter>,
    ) -> Self {
        let categories = CategoryResolver::new(db.category_mappings(), platform.clone());

        SyncOrchestrator {
            runs: db.sync_runs(),
            calculator: config.range_calculator(),
            retry: RetryPolicy::from_settings(&config.retry),
            products: ProductMapper::new(&config.mapping, categories),
            orders: OrderMapper::new(config.mapping.currency.clone()),
            customers: CustomerMapper::new(),
            emitter: Arc::new(NoOpEmitter),
            overrides: HashMap::new(),
            config,
            erp,
            platform,
        }
    }

    /// Replaces the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Registers overrides for the product with `sku`.
    pub fn with_product_overrides(mut self, sku: impl Into<String>, overrides: ProductOverrides) -> Self {
        self.overrides.insert(sku.into(), overrides);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // =========================================================================
    // Run Control
    // =========================================================================

    /// Starts a run for `entity`.
    ///
    /// ## Errors
    /// - `MissingErpEndpoint` / `InvalidConfig` / `InvalidUrl`: nothing is created
    /// - `AlreadyRunning`: a run for `entity` is still running
    pub async fn start_sync(
        &self,
        entity: EntityType,
        direction: SyncDirection,
        filters: SyncFilters,
    ) -> SyncResult<SyncRun> {
        if let Err(e) = self.config.validate() {
            error!(entity = %entity, error = %e, "Refusing to start sync with invalid configuration");
            self.emitter.emit_error(&e.to_string(), false);
            return Err(e);
        }

        if let Some(running) = self.runs.find_running(entity).await? {
            warn!(entity = %entity, run_id = %running.id, "Sync already running");
            return Err(SyncError::AlreadyRunning { entity });
        }

        let batch_size = self
            .calculator
            .clamp_batch_size(entity, self.config.batch.size_for(entity));

        // The partial unique index catches a concurrent start between the
        // check above and the insert
        let run = self
            .runs
            .create(entity, direction, batch_size as i64, &filters)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    SyncError::AlreadyRunning { entity }
                } else {
                    SyncError::from(e)
                }
            })?;

        info!(
            run_id = %run.id,
            entity = %entity,
            direction = %direction,
            batch_size,
            "Sync started"
        );
        self.emitter.emit_status(&run);

        Ok(run)
    }

    /// Flags a run for cancellation; it stops at its next batch.
    ///
    /// Writes already made are kept.
    pub async fn cancel_sync(&self, run_id: &str) -> SyncResult<()> {
        if self.runs.request_cancel(run_id).await? {
            info!(run_id = %run_id, "Cancellation requested");
            return Ok(());
        }

        let run = self.runs.require(run_id).await?;
        Err(SyncError::RunNotRunning {
            id: run.id,
            status: run.status.to_string(),
        })
    }

    /// Ends a running run as completed (`success`) or failed.
    pub async fn complete(&self, run_id: &str, success: bool) -> SyncResult<SyncRun> {
        let status = if success {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };

        if !self.runs.finish(run_id, status, None).await? {
            let run = self.runs.require(run_id).await?;
            return Err(SyncError::RunNotRunning {
                id: run.id,
                status: run.status.to_string(),
            });
        }

        let run = self.runs.require(run_id).await?;
        self.emitter.emit_status(&run);
        Ok(run)
    }

    /// Latest run for `entity` with its first item errors.
    pub async fn get_sync_status(&self, entity: EntityType) -> SyncResult<SyncStatusReport> {
        let run = self.runs.latest_for_entity(entity).await?;

        let (errors, total_errors) = match &run {
            Some(run) => {
                let limit = self.config.report.max_reported_errors as u32;
                (
                    self.runs.list_errors(&run.id, limit).await?,
                    self.runs.count_errors(&run.id).await?,
                )
            }
            None => (Vec::new(), 0),
        };

        Ok(SyncStatusReport {
            entity,
            run,
            errors,
            total_errors,
        })
    }

    // =========================================================================
    // Batch Processing
    // =========================================================================

    /// Processes the next batch of a running run.
    ///
    /// ## Errors
    /// - `RunNotFound` / `RunNotRunning`
    /// - the fetch error when fetching exhausts its retries (the run is
    ///   marked failed first)
    /// - `Store` when progress cannot be persisted (the run is marked failed
    ///   when possible)
    pub async fn process_next_batch(&self, run_id: &str) -> SyncResult<BatchOutcome> {
        let run = self.runs.require(run_id).await?;
        if !run.is_running() {
            return Err(SyncError::RunNotRunning {
                id: run.id,
                status: run.status.to_string(),
            });
        }

        if run.cancel_requested {
            return self.cancel_now(&run).await;
        }

        let cursor = run.current_offset.max(0) as u64;
        let batch_size = run.batch_size.max(1) as u64;

        let outcome = match self.calculator.plan(run.entity, cursor, batch_size) {
            RangePlan::Skip {
                requested,
                bad,
                next_cursor,
            } => self.skip_range(&run, requested, bad, next_cursor).await?,
            RangePlan::Fetch(range) => self.process_range(&run, range).await?,
        };

        self.emitter.emit_progress(&outcome);
        if outcome.done {
            self.emit_run(&run.id).await;
        }

        Ok(outcome)
    }

    async fn cancel_now(&self, run: &SyncRun) -> SyncResult<BatchOutcome> {
        self.runs.finish(&run.id, RunStatus::Cancelled, None).await?;
        info!(run_id = %run.id, entity = %run.entity, offset = run.current_offset, "Sync cancelled");

        let outcome = BatchOutcome {
            run_id: run.id.clone(),
            range: None,
            delta: RunCounters::default(),
            status: RunStatus::Cancelled,
            done: true,
        };
        self.emitter.emit_progress(&outcome);
        self.emit_run(&run.id).await;

        Ok(outcome)
    }

    /// Skips a range overlapping a known bad range. The whole requested range
    /// is skipped and the cursor jumps to the end of the bad range.
    async fn skip_range(
        &self,
        run: &SyncRun,
        requested: BatchRange,
        bad: BadRange,
        next_cursor: u64,
    ) -> SyncResult<BatchOutcome> {
        let cursor = run.current_offset.max(0) as u64;
        warn!(
            run_id = %run.id,
            entity = %run.entity,
            requested = %requested,
            bad_start = bad.start,
            bad_end = bad.end,
            next_cursor,
            "Skipping range overlapping a known bad range"
        );

        let delta = RunCounters {
            skipped: next_cursor.saturating_sub(cursor) as i64,
            ..RunCounters::default()
        };
        let skipped = ItemError::new(
            &run.id,
            requested.to_string(),
            RANGE_SKIPPED_REASON,
            format!("overlaps known bad range {}-{}", bad.start, bad.end),
        );

        self.commit(run, next_cursor, delta, &[skipped]).await?;

        Ok(BatchOutcome {
            run_id: run.id.clone(),
            range: Some(requested),
            delta,
            status: RunStatus::Running,
            done: false,
        })
    }

    async fn process_range(&self, run: &SyncRun, range: BatchRange) -> SyncResult<BatchOutcome> {
        debug!(run_id = %run.id, entity = %run.entity, range = %range, "Processing batch");

        let records = match self.fetch(run, range).await {
            Ok(records) => records,
            Err(e) => {
                let message = e.to_string();
                error!(run_id = %run.id, range = %range, error = %message, "Fetch failed, marking run failed");
                self.runs.finish(&run.id, RunStatus::Failed, Some(&message)).await?;
                self.emitter.emit_error(&message, e.is_retryable());
                self.emit_run(&run.id).await;
                return Err(e);
            }
        };

        let requested = range.size();
        let received = (records.len() as u64).min(requested);
        let done = received < requested;

        let mut cache = BatchCache::new();
        let mut delta = RunCounters::default();
        let mut errors = Vec::new();

        for (position, raw) in (range.start..).zip(records.iter().take(received as usize)) {
            delta.processed += 1;
            match self.sync_record(run, raw, &mut cache).await {
                Ok(()) => delta.succeeded += 1,
                Err(e) => {
                    let item = item_label(raw, position);
                    debug!(run_id = %run.id, item = %item, error = %e, "Record failed");
                    delta.errored += 1;
                    errors.push(ItemError::new(&run.id, item, e.reason_code(), e.to_string()));
                }
            }
        }

        let next_cursor = range.start - 1 + received;
        self.commit(run, next_cursor, delta, &errors).await?;

        info!(
            run_id = %run.id,
            entity = %run.entity,
            range = %range,
            processed = delta.processed,
            succeeded = delta.succeeded,
            errored = delta.errored,
            cache_hits = cache.hits(),
            "Batch processed"
        );

        let status = if done {
            self.runs.finish(&run.id, RunStatus::Completed, None).await?;
            RunStatus::Completed
        } else {
            RunStatus::Running
        };

        Ok(BatchOutcome {
            run_id: run.id.clone(),
            range: Some(range),
            delta,
            status,
            done,
        })
    }

    /// Persists the cursor, the accumulated counters and the item errors.
    async fn commit(
        &self,
        run: &SyncRun,
        next_cursor: u64,
        delta: RunCounters,
        errors: &[ItemError],
    ) -> SyncResult<()> {
        let mut counters = run.counters;
        counters.absorb(&delta);

        let progress = RunProgress {
            current_offset: next_cursor as i64,
            counters,
        };

        match self.runs.commit_batch(&run.id, progress, errors).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                let current = self.runs.require(&run.id).await?;
                warn!(run_id = %run.id, status = %current.status, "Run left running state during batch");
                Err(SyncError::RunNotRunning {
                    id: current.id,
                    status: current.status.to_string(),
                })
            }
            Err(e) => {
                let message = format!("failed to persist batch progress: {}", e);
                error!(run_id = %run.id, error = %e, "Failed to persist batch progress");
                if let Err(finish_err) = self.runs.finish(&run.id, RunStatus::Failed, Some(&message)).await {
                    error!(run_id = %run.id, error = %finish_err, "Failed to mark run failed");
                }
                self.emitter.emit_error(&message, false);
                Err(e.into())
            }
        }
    }

    async fn fetch(&self, run: &SyncRun, range: BatchRange) -> SyncResult<Vec<Value>> {
        let entity = run.entity;
        let filters = &run.filters;

        match run.direction {
            SyncDirection::ErpToPlatform => {
                let erp = self.erp.as_ref();
                self.retry
                    .run("erp fetch_records", move || erp.fetch_records(entity, range, filters))
                    .await
            }
            SyncDirection::PlatformToErp => {
                let platform = self.platform.as_ref();
                self.retry
                    .run("platform fetch_records", move || {
                        platform.fetch_records(entity, range, filters)
                    })
                    .await
            }
        }
    }

    // =========================================================================
    // Per-Record Work
    // =========================================================================

    async fn sync_record(&self, run: &SyncRun, raw: &Value, cache: &mut BatchCache) -> SyncResult<()> {
        let record = ExternalRecord::from_value_ref(raw)?;
        match run.direction {
            SyncDirection::ErpToPlatform => self.import_record(run.entity, &record, cache).await,
            SyncDirection::PlatformToErp => self.export_record(run.entity, &record).await,
        }
    }

    async fn import_record(
        &self,
        entity: EntityType,
        record: &ExternalRecord,
        cache: &mut BatchCache,
    ) -> SyncResult<()> {
        let platform = self.platform.as_ref();

        let (item, outcome) = match entity {
            EntityType::Products => {
                let product = self.map_product(record, cache).await?;
                let product = &product;
                let outcome = self
                    .retry
                    .run("upsert_product", move || platform.upsert_product(product))
                    .await?;
                (product.sku.clone(), outcome)
            }
            EntityType::Orders => {
                let order = self.orders.to_normalized(record)?;
                let order = &order;
                let outcome = self
                    .retry
                    .run("upsert_order", move || platform.upsert_order(order))
                    .await?;
                (order.external_id.clone(), outcome)
            }
            EntityType::Customers => {
                let customer = self.customers.to_normalized(record)?;
                let customer = &customer;
                let outcome = self
                    .retry
                    .run("upsert_customer", move || platform.upsert_customer(customer))
                    .await?;
                (customer.external_id.clone(), outcome)
            }
        };

        accept(item, outcome)
    }

    async fn map_product(
        &self,
        record: &ExternalRecord,
        cache: &mut BatchCache,
    ) -> SyncResult<NormalizedProduct> {
        let none = ProductOverrides::default();
        let overrides = self
            .products
            .reader()
            .resolve_sku(record)
            .and_then(|sku| self.overrides.get(&sku))
            .unwrap_or(&none);

        let mut product = self.products.to_normalized(record, overrides, cache).await?;

        if self.config.mapping.resolve_tariff_prices {
            let resolution = self.tariff_price(&product, cache).await;
            if let Some(effective) = resolution.effective_price {
                product.apply_sale_price(effective);
            }
        }

        Ok(product)
    }

    /// Looks up the tariff price of a product, once per batch.
    ///
    /// Failures resolve to "not found", which keeps the mapped base price.
    async fn tariff_price(&self, product: &NormalizedProduct, cache: &mut BatchCache) -> PriceResolution {
        let product_id = product.external_id.as_str();
        if let Some(cached) = cache.price(product_id) {
            return cached;
        }

        let erp = self.erp.as_ref();
        let customer = self.config.erp.tariff_customer_id;
        let resolution = match self
            .retry
            .run("fetch_tariff_conditions", move || {
                erp.fetch_tariff_conditions(product_id, customer)
            })
            .await
        {
            Ok(conditions) => resolve_price(&conditions),
            Err(e) => {
                let failure = SyncError::TariffResolution {
                    product_id: product_id.to_string(),
                    message: e.to_string(),
                };
                warn!(sku = %product.sku, error = %failure, "Keeping base price");
                PriceResolution::not_found()
            }
        };

        cache.remember_price(product_id, resolution);
        resolution
    }

    async fn export_record(&self, entity: EntityType, record: &ExternalRecord) -> SyncResult<()> {
        let payload = match entity {
            EntityType::Products => {
                let payload = self.products.to_external(record);
                if payload.is_empty() {
                    return Err(ValidationError::MissingSku.into());
                }
                payload
            }
            EntityType::Orders => self.orders.to_external(record)?,
            EntityType::Customers => self.customers.to_external(record)?,
        };

        let erp = self.erp.as_ref();
        let payload = &payload;
        let erp_id = self
            .retry
            .run("push_record", move || erp.push_record(entity, payload))
            .await?;

        debug!(entity = %entity, erp_id = %erp_id, "Record pushed to ERP");
        Ok(())
    }

    async fn emit_run(&self, run_id: &str) {
        match self.runs.get(run_id).await {
            Ok(Some(run)) => self.emitter.emit_status(&run),
            Ok(None) => {}
            Err(e) => warn!(run_id = %run_id, error = %e, "Failed to load run for status event"),
        }
    }
}

/// Turns a store rejection into an item error.
fn accept(item: String, outcome: WriteOutcome) -> SyncResult<()> {
    match outcome.error {
        None => Ok(()),
        Some(message) => Err(SyncError::PlatformRejected { item, message }),
    }
}

/// Best label for an item error: sku or id, else the record position.
fn item_label(raw: &Value, position: u64) -> String {
    ExternalRecord::from_value_ref(raw)
        .ok()
        .and_then(|record| record.first_scalar(ITEM_LABEL_FIELDS))
        .unwrap_or_else(|| format!("#{}", position))
}
