//! End-to-end runs against an in-memory database and fake ERP / store ports.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use verial_core::{
    BadRange, BatchOutcome, BatchRange, EntityType, ExternalRecord, Money, NormalizedCustomer,
    NormalizedOrder, NormalizedProduct, ProductOverrides, ProductType, RunCounters, RunStatus,
    SyncDirection, SyncFilters, SyncRun, RANGE_SKIPPED_REASON,
};
use verial_db::{Database, DbConfig, RunProgress};
use verial_sync::{
    ErpClient, PlatformWriter, SyncConfig, SyncDriver, SyncError, SyncEventEmitter,
    SyncOrchestrator, SyncResult, WriteOutcome,
};

// =============================================================================
// Fakes
// =============================================================================

/// Records at 1-based positions `range.start..=range.end`.
fn slice(records: &[Value], range: BatchRange) -> Vec<Value> {
    let start = (range.start as usize).saturating_sub(1).min(records.len());
    let end = (range.end as usize).min(records.len());
    records[start..end].to_vec()
}

#[derive(Default)]
struct FakeErp {
    records: HashMap<EntityType, Vec<Value>>,
    tariffs: HashMap<String, Value>,
    fail_fetch: AtomicBool,
    fetch_attempts: AtomicUsize,
    fetches: Mutex<Vec<BatchRange>>,
    tariff_calls: AtomicUsize,
    pushed: Mutex<Vec<(EntityType, ExternalRecord)>>,
}

impl FakeErp {
    fn with(mut self, entity: EntityType, records: Vec<Value>) -> Self {
        self.records.insert(entity, records);
        self
    }

    fn with_tariff(mut self, product_id: &str, conditions: Value) -> Self {
        self.tariffs.insert(product_id.to_string(), conditions);
        self
    }
}

#[async_trait]
impl ErpClient for FakeErp {
    async fn fetch_records(
        &self,
        entity: EntityType,
        range: BatchRange,
        _filters: &SyncFilters,
    ) -> SyncResult<Vec<Value>> {
        self.fetch_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::ErpUnavailable("connection refused".into()));
        }
        self.fetches.lock().unwrap().push(range);
        Ok(self
            .records
            .get(&entity)
            .map(|records| slice(records, range))
            .unwrap_or_default())
    }

    async fn fetch_tariff_conditions(&self, product_id: &str, _customer_id: i64) -> SyncResult<Value> {
        self.tariff_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tariffs.get(product_id).cloned().unwrap_or_else(|| json!([])))
    }

    async fn push_record(&self, entity: EntityType, record: &ExternalRecord) -> SyncResult<String> {
        let mut pushed = self.pushed.lock().unwrap();
        pushed.push((entity, record.clone()));
        Ok(format!("V{}", pushed.len()))
    }
}

#[derive(Default)]
struct FakeStore {
    products: Mutex<Vec<NormalizedProduct>>,
    orders: Mutex<Vec<NormalizedOrder>>,
    customers: Mutex<Vec<NormalizedCustomer>>,
    categories: Mutex<Vec<(i64, String, Option<i64>)>>,
    category_creates: AtomicUsize,
    reject_skus: Vec<String>,
    /// Remaining transient failures per sku before the write goes through.
    flaky_skus: Mutex<HashMap<String, usize>>,
    upsert_attempts: AtomicUsize,
    export: HashMap<EntityType, Vec<Value>>,
}

#[async_trait]
impl PlatformWriter for FakeStore {
    async fn upsert_product(&self, product: &NormalizedProduct) -> SyncResult<WriteOutcome> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(remaining) = self.flaky_skus.lock().unwrap().get_mut(&product.sku) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SyncError::PlatformUnavailable("502 bad gateway".into()));
            }
        }
        if self.reject_skus.contains(&product.sku) {
            return Ok(WriteOutcome::rejected("duplicate sku"));
        }
        let mut products = self.products.lock().unwrap();
        products.push(product.clone());
        Ok(WriteOutcome::ok(products.len() as i64))
    }

    async fn upsert_order(&self, order: &NormalizedOrder) -> SyncResult<WriteOutcome> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        Ok(WriteOutcome::ok(orders.len() as i64))
    }

    async fn upsert_customer(&self, customer: &NormalizedCustomer) -> SyncResult<WriteOutcome> {
        let mut customers = self.customers.lock().unwrap();
        customers.push(customer.clone());
        Ok(WriteOutcome::ok(customers.len() as i64))
    }

    async fn find_category(&self, name: &str, parent: Option<i64>) -> SyncResult<Option<i64>> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .find(|(_, n, p)| n == name && *p == parent)
            .map(|(id, _, _)| *id))
    }

    async fn create_category(&self, name: &str, parent: Option<i64>) -> SyncResult<i64> {
        self.category_creates.fetch_add(1, Ordering::SeqCst);
        let mut categories = self.categories.lock().unwrap();
        let id = 100 + categories.len() as i64;
        categories.push((id, name.to_string(), parent));
        Ok(id)
    }

    async fn fetch_records(
        &self,
        entity: EntityType,
        range: BatchRange,
        _filters: &SyncFilters,
    ) -> SyncResult<Vec<Value>> {
        Ok(self
            .export
            .get(&entity)
            .map(|records| slice(records, range))
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingEmitter {
    statuses: Mutex<Vec<RunStatus>>,
    progress: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

impl SyncEventEmitter for RecordingEmitter {
    fn emit_status(&self, run: &SyncRun) {
        self.statuses.lock().unwrap().push(run.status);
    }

    fn emit_progress(&self, _outcome: &BatchOutcome) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    fn emit_error(&self, message: &str, _retryable: bool) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    orchestrator: Arc<SyncOrchestrator>,
    db: Arc<Database>,
    erp: Arc<FakeErp>,
    store: Arc<FakeStore>,
    events: Arc<RecordingEmitter>,
}

fn config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.erp.endpoint = Some("http://verial.test:8000/WcfServiceLibraryVerial".into());
    config.retry.max_attempts = 2;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_secs = 1;
    config.retry.call_timeout_secs = 5;
    config.mapping.resolve_tariff_prices = false;
    config
}

async fn harness(config: SyncConfig, erp: FakeErp, store: FakeStore) -> Harness {
    harness_with(config, erp, store, |orchestrator| orchestrator).await
}

async fn harness_with(
    config: SyncConfig,
    erp: FakeErp,
    store: FakeStore,
    customize: impl FnOnce(SyncOrchestrator) -> SyncOrchestrator,
) -> Harness {
    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    let erp = Arc::new(erp);
    let store = Arc::new(store);
    let events = Arc::new(RecordingEmitter::default());

    let orchestrator = SyncOrchestrator::new(Arc::new(config), db.clone(), erp.clone(), store.clone())
        .with_emitter(events.clone());

    Harness {
        orchestrator: Arc::new(customize(orchestrator)),
        db,
        erp,
        store,
        events,
    }
}

fn order(id: i64) -> Value {
    json!({"Id": id, "Estado": 0, "ImporteTotal": 10, "Cliente": {"Nombre": "Ana", "Email": "ana@example.com"}})
}

fn customer(id: i64) -> Value {
    json!({"Id": id, "Nombre": format!("Cliente {}", id), "Localidad": "Murcia"})
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_product_import_maps_writes_and_reports() {
    let erp = FakeErp::default().with(
        EntityType::Products,
        vec![
            json!({"Id": 1, "ReferenciaBarras": "A-1", "Nombre": "Zumo de naranja", "PVP": 2.5, "ID_Categoria": 12, "NombreCategoria": "Bebidas"}),
            json!({"Nombre": "Sin referencia", "PVP": 1}),
            json!({"Id": 3, "ReferenciaBarras": "A-3", "Nombre": "Servilletas"}),
            json!({"Id": 4, "ReferenciaBarras": "A-4", "ID_Categoria": 12, "NombreCategoria": "Bebidas"}),
            json!({"Id": 5, "ReferenciaBarras": "REJ-1"}),
        ],
    );
    let store = FakeStore {
        reject_skus: vec!["REJ-1".into()],
        ..FakeStore::default()
    };
    let h = harness(config(), erp, store).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.batch_size, 50);

    let outcome = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert!(outcome.done);
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.range, Some(BatchRange { start: 1, end: 50 }));
    assert_eq!(outcome.delta.processed, 5);
    assert_eq!(outcome.delta.succeeded, 3);
    assert_eq!(outcome.delta.errored, 2);

    // One category created for both products that reference it
    let products = h.store.products.lock().unwrap().clone();
    assert_eq!(products.len(), 3);
    assert_eq!(products[0].category_ids, vec![100]);
    assert_eq!(products[1].category_ids, vec![15]);
    assert_eq!(products[2].category_ids, vec![100]);
    assert_eq!(h.store.category_creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.db.category_mappings().get_term_id("12").await.unwrap(),
        Some(100)
    );

    let report = h.orchestrator.get_sync_status(EntityType::Products).await.unwrap();
    let latest = report.run.unwrap();
    assert_eq!(latest.status, RunStatus::Completed);
    assert_eq!(latest.counters.processed, 5);
    assert!(latest.finished_at.is_some());
    assert_eq!(report.total_errors, 2);
    assert_eq!(report.errors[0].reason, "missing_sku");
    assert_eq!(report.errors[0].item, "#2");
    assert_eq!(report.errors[1].reason, "platform_rejected");
    assert_eq!(report.errors[1].item, "REJ-1");

    assert_eq!(
        *h.events.statuses.lock().unwrap(),
        vec![RunStatus::Running, RunStatus::Completed]
    );
}

#[tokio::test]
async fn test_category_mapping_survives_batches() {
    let mut cfg = config();
    cfg.batch.products = 1;
    let erp = FakeErp::default().with(
        EntityType::Products,
        vec![
            json!({"Id": 1, "ID_Categoria": 7, "NombreCategoria": "Alimentación > Aceites"}),
            json!({"Id": 2, "ID_Categoria": 7}),
        ],
    );
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
    h.orchestrator.process_next_batch(&run.id).await.unwrap();
    h.orchestrator.process_next_batch(&run.id).await.unwrap();

    // Two levels created once; the second batch finds the leaf in the index
    assert_eq!(h.store.category_creates.load(Ordering::SeqCst), 2);
    let categories = h.store.categories.lock().unwrap().clone();
    assert_eq!(categories[1], (101, "Aceites".to_string(), Some(100)));

    let products = h.store.products.lock().unwrap().clone();
    assert_eq!(products[0].category_ids, vec![101]);
    assert_eq!(products[1].category_ids, vec![101]);
}

#[tokio::test]
async fn test_variable_product_and_overrides() {
    let erp = FakeErp::default().with(
        EntityType::Products,
        vec![json!({
            "Id": 7,
            "ReferenciaBarras": "CAM",
            "Nombre": "Camiseta",
            "PVP": 15,
            "Variaciones": [
                {"ReferenciaBarras": "CAM-R", "Atributos": [{"Nombre": "Color", "Valor": "Rojo"}]},
                {"ReferenciaBarras": "CAM-A", "Atributos": [{"Nombre": "Color", "Valor": "Azul"}]}
            ]
        })],
    );
    let h = harness_with(config(), erp, FakeStore::default(), |orchestrator| {
        orchestrator.with_product_overrides(
            "CAM",
            ProductOverrides {
                name: Some("Camiseta básica".into()),
                ..ProductOverrides::default()
            },
        )
    })
    .await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
    h.orchestrator.process_next_batch(&run.id).await.unwrap();

    let products = h.store.products.lock().unwrap().clone();
    let product = &products[0];
    assert_eq!(product.name, "Camiseta básica");
    assert_eq!(product.product_type, ProductType::Variable);
    assert_eq!(product.variations.len(), 2);
    let color = product.attributes.iter().find(|a| a.name == "Color").unwrap();
    assert!(color.is_variation);
    assert_eq!(color.values, vec!["Rojo", "Azul"]);
}

#[tokio::test]
async fn test_tariff_prices_are_cached_per_batch() {
    let mut cfg = config();
    cfg.mapping.resolve_tariff_prices = true;
    let erp = FakeErp::default()
        .with(
            EntityType::Products,
            vec![
                json!({"Id": 101, "PVP": 10}),
                json!({"Id": 102, "PVP": 10}),
                json!({"Id": 103, "PVP": 10}),
                json!({"Id": 101, "PVP": 10}),
            ],
        )
        .with_tariff("101", json!({"Condiciones": [{"Precio": 10, "Dto": 20}]}))
        .with_tariff("102", json!({"Condiciones": [{"Precio": 12}]}));
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
    h.orchestrator.process_next_batch(&run.id).await.unwrap();

    assert_eq!(h.erp.tariff_calls.load(Ordering::SeqCst), 3);

    let products = h.store.products.lock().unwrap().clone();
    assert_eq!(products[0].sale_price, Some(Money::from_cents(800)));
    assert_eq!(products[1].sale_price, None);
    assert_eq!(products[2].sale_price, None);
    assert_eq!(products[3].sale_price, Some(Money::from_cents(800)));
    assert!(products.iter().all(|p| p.price == Money::from_cents(1000)));
}

#[tokio::test]
async fn test_transient_write_failures_are_retried_then_recorded() {
    let erp = FakeErp::default().with(
        EntityType::Products,
        vec![
            json!({"Id": 1, "ReferenciaBarras": "ONCE"}),
            json!({"Id": 2, "ReferenciaBarras": "DOWN"}),
            json!({"Id": 3, "ReferenciaBarras": "OK"}),
        ],
    );
    let store = FakeStore::default();
    store.flaky_skus.lock().unwrap().insert("ONCE".into(), 1);
    store.flaky_skus.lock().unwrap().insert("DOWN".into(), 10);
    let h = harness(config(), erp, store).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
    let outcome = h.orchestrator.process_next_batch(&run.id).await.unwrap();

    // The failing item does not abort the batch
    assert!(outcome.done);
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.delta.processed, 3);
    assert_eq!(outcome.delta.succeeded, 2);
    assert_eq!(outcome.delta.errored, 1);

    // ONCE: fail + retry, DOWN: two attempts (the budget), OK: one
    assert_eq!(h.store.upsert_attempts.load(Ordering::SeqCst), 5);
    let skus: Vec<String> = h.store.products.lock().unwrap().iter().map(|p| p.sku.clone()).collect();
    assert_eq!(skus, vec!["ONCE", "OK"]);

    let report = h.orchestrator.get_sync_status(EntityType::Products).await.unwrap();
    assert_eq!(report.total_errors, 1);
    assert_eq!(report.errors[0].item, "DOWN");
    assert_eq!(report.errors[0].reason, "platform_unavailable");
    assert!(report.errors[0].message.contains("502"));
}

#[tokio::test]
async fn test_default_product_bad_range_is_never_fetched() {
    let mut cfg = config();
    cfg.batch.products = 11;
    let records: Vec<Value> = (1..=3215)
        .map(|id| json!({"Id": id, "ReferenciaBarras": format!("P-{}", id)}))
        .collect();
    let erp = FakeErp::default().with(EntityType::Products, records);
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    // Resume from position 3194 so the next request is [3195, 3205]
    let resumed = h
        .db
        .sync_runs()
        .commit_batch(
            &run.id,
            RunProgress {
                current_offset: 3194,
                counters: RunCounters::default(),
            },
            &[],
        )
        .await
        .unwrap();
    assert!(resumed);

    let skipped = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert_eq!(skipped.range, Some(BatchRange { start: 3195, end: 3205 }));
    assert_eq!(skipped.delta.processed, 0);
    assert_eq!(skipped.delta.skipped, 16);
    assert!(!skipped.done);

    let last = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert_eq!(last.range, Some(BatchRange { start: 3211, end: 3221 }));
    assert_eq!(last.delta.succeeded, 5);
    assert!(last.done);

    let fetches = h.erp.fetches.lock().unwrap().clone();
    assert_eq!(fetches, vec![BatchRange { start: 3211, end: 3221 }]);
    assert!(fetches.iter().all(|r| r.end < 3201 || r.start > 3210));

    let products = h.store.products.lock().unwrap().clone();
    assert!(products.iter().all(|p| !(3201..=3210).contains(&p.external_id.parse::<i64>().unwrap())));
    assert_eq!(products.first().map(|p| p.sku.as_str()), Some("P-3211"));

    let report = h.orchestrator.get_sync_status(EntityType::Products).await.unwrap();
    let latest = report.run.unwrap();
    assert_eq!(latest.status, RunStatus::Completed);
    assert_eq!(latest.current_offset, 3215);
    assert_eq!(latest.counters.skipped, 16);
    assert_eq!(report.errors[0].reason, RANGE_SKIPPED_REASON);
    assert_eq!(report.errors[0].item, "3195-3205");
}

// =============================================================================
// Run Lifecycle
// =============================================================================

#[tokio::test]
async fn test_single_run_per_entity() {
    let h = harness(config(), FakeErp::default(), FakeStore::default()).await;

    h.orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    let err = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::PlatformToErp, SyncFilters::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::AlreadyRunning {
            entity: EntityType::Products
        }
    ));

    // Other entities are independent
    h.orchestrator
        .start_sync(EntityType::Orders, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalid_config_creates_no_run() {
    let mut cfg = config();
    cfg.erp.endpoint = None;
    let h = harness(cfg, FakeErp::default(), FakeStore::default()).await;

    let err = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap_err();
    assert!(err.is_config_error());

    let report = h.orchestrator.get_sync_status(EntityType::Products).await.unwrap();
    assert!(report.run.is_none());
    assert_eq!(report.total_errors, 0);
    assert_eq!(h.events.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_range_is_skipped() {
    let mut cfg = config();
    cfg.batch.customers = 5;
    cfg.bad_ranges.push(BadRange {
        entity: EntityType::Customers,
        start: 6,
        end: 8,
    });
    let erp = FakeErp::default().with(EntityType::Customers, (1..=20).map(customer).collect());
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Customers, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    let first = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert_eq!(first.delta.succeeded, 5);
    assert!(!first.done);

    let skipped = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert_eq!(skipped.range, Some(BatchRange { start: 6, end: 10 }));
    assert_eq!(skipped.delta.skipped, 3);
    assert_eq!(skipped.delta.processed, 0);
    assert_eq!(skipped.status, RunStatus::Running);

    let third = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert_eq!(third.range, Some(BatchRange { start: 9, end: 13 }));

    // The skipped range was never fetched
    assert_eq!(
        *h.erp.fetches.lock().unwrap(),
        vec![BatchRange { start: 1, end: 5 }, BatchRange { start: 9, end: 13 }]
    );

    let report = h.orchestrator.get_sync_status(EntityType::Customers).await.unwrap();
    let latest = report.run.unwrap();
    assert_eq!(latest.current_offset, 13);
    assert_eq!(latest.counters.skipped, 3);
    assert_eq!(report.errors[0].reason, RANGE_SKIPPED_REASON);
    assert_eq!(report.errors[0].item, "6-10");
    assert!(report.errors[0].message.contains("6-8"));
}

#[tokio::test]
async fn test_cancel_takes_effect_at_next_batch() {
    let mut cfg = config();
    cfg.batch.orders = 2;
    let erp = FakeErp::default().with(EntityType::Orders, (1..=5).map(order).collect());
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Orders, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
    h.orchestrator.process_next_batch(&run.id).await.unwrap();
    h.orchestrator.cancel_sync(&run.id).await.unwrap();

    let outcome = h.orchestrator.process_next_batch(&run.id).await.unwrap();
    assert!(outcome.done);
    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert_eq!(outcome.range, None);

    // Writes from the first batch are kept
    assert_eq!(h.store.orders.lock().unwrap().len(), 2);

    let latest = h
        .orchestrator
        .get_sync_status(EntityType::Orders)
        .await
        .unwrap()
        .run
        .unwrap();
    assert_eq!(latest.status, RunStatus::Cancelled);
    assert_eq!(latest.current_offset, 2);

    assert!(matches!(
        h.orchestrator.process_next_batch(&run.id).await,
        Err(SyncError::RunNotRunning { .. })
    ));
    assert!(matches!(
        h.orchestrator.cancel_sync(&run.id).await,
        Err(SyncError::RunNotRunning { .. })
    ));
}

#[tokio::test]
async fn test_fetch_failure_marks_run_failed() {
    let erp = FakeErp::default();
    erp.fail_fetch.store(true, Ordering::SeqCst);
    let h = harness(config(), erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    let err = h.orchestrator.process_next_batch(&run.id).await.unwrap_err();
    assert!(matches!(err, SyncError::ErpUnavailable(_)));
    assert_eq!(h.erp.fetch_attempts.load(Ordering::SeqCst), 2);

    let latest = h
        .orchestrator
        .get_sync_status(EntityType::Products)
        .await
        .unwrap()
        .run
        .unwrap();
    assert_eq!(latest.status, RunStatus::Failed);
    assert!(latest.last_error.unwrap().contains("connection refused"));
    assert_eq!(h.events.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_completion() {
    let h = harness(config(), FakeErp::default(), FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Customers, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    let finished = h.orchestrator.complete(&run.id, false).await.unwrap();
    assert_eq!(finished.status, RunStatus::Failed);
    assert!(finished.finished_at.is_some());

    assert!(matches!(
        h.orchestrator.complete(&run.id, true).await,
        Err(SyncError::RunNotRunning { .. })
    ));
    assert!(matches!(
        h.orchestrator.process_next_batch("no-such-run").await,
        Err(SyncError::RunNotFound(_))
    ));

    // A finished run frees the entity
    h.orchestrator
        .start_sync(EntityType::Customers, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();
}

// =============================================================================
// Export Direction
// =============================================================================

#[tokio::test]
async fn test_customer_export_pushes_to_erp() {
    let mut export = HashMap::new();
    export.insert(
        EntityType::Customers,
        vec![
            json!({
                "id": 12,
                "email": "luis@example.com",
                "first_name": "Luis",
                "last_name": "Mora",
                "billing": {"city": "Valencia", "phone": "600 111 222"}
            }),
            json!({"id": 0, "first_name": "Sin id"}),
        ],
    );
    let store = FakeStore {
        export,
        ..FakeStore::default()
    };
    let h = harness(config(), FakeErp::default(), store).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Customers, SyncDirection::PlatformToErp, SyncFilters::default())
        .await
        .unwrap();
    let outcome = h.orchestrator.process_next_batch(&run.id).await.unwrap();

    assert!(outcome.done);
    assert_eq!(outcome.delta.succeeded, 1);
    assert_eq!(outcome.delta.errored, 1);

    let pushed = h.erp.pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].0, EntityType::Customers);
    assert_eq!(pushed[0].1.get("Id"), Some(&json!(12)));
    assert_eq!(pushed[0].1.get("Localidad"), Some(&json!("Valencia")));

    let report = h.orchestrator.get_sync_status(EntityType::Customers).await.unwrap();
    assert_eq!(report.errors[0].reason, "invalid_id");
}

// =============================================================================
// Driver
// =============================================================================

#[tokio::test]
async fn test_driver_runs_until_done() {
    let mut cfg = config();
    cfg.batch.orders = 2;
    let erp = FakeErp::default().with(EntityType::Orders, (1..=5).map(order).collect());
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Orders, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    let (driver, _handle) = SyncDriver::with_interval(h.orchestrator.clone(), Duration::from_millis(5));
    let status = driver.run(run.id.clone()).await.unwrap();

    assert_eq!(status, RunStatus::Completed);
    assert_eq!(h.store.orders.lock().unwrap().len(), 5);
    assert_eq!(h.events.progress.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_driver_shutdown_leaves_run_resumable() {
    let mut cfg = config();
    cfg.batch.orders = 2;
    let erp = FakeErp::default().with(EntityType::Orders, (1..=10).map(order).collect());
    let h = harness(cfg, erp, FakeStore::default()).await;

    let run = h
        .orchestrator
        .start_sync(EntityType::Orders, SyncDirection::ErpToPlatform, SyncFilters::default())
        .await
        .unwrap();

    let (driver, handle) = SyncDriver::with_interval(h.orchestrator.clone(), Duration::from_secs(3600));
    handle.shutdown().await.unwrap();
    let status = driver.run(run.id.clone()).await.unwrap();

    // At most the immediate first tick ran before the shutdown was seen
    assert_eq!(status, RunStatus::Running);
    assert!(h.store.orders.lock().unwrap().len() <= 2);

    let latest = h
        .orchestrator
        .get_sync_status(EntityType::Orders)
        .await
        .unwrap()
        .run
        .unwrap();
    assert!(latest.is_running());
}
