use std::sync::Arc;

use clinicrx_events::{EventEnvelope, InMemoryEventBus};
use clinicrx_infra::sources::{load_prescriptions, load_test_catalog};
use clinicrx_infra::{
    BillingWorkflow, InMemoryGateway, JsonFileGateway, PersistenceGateway, Settings, StoreBackend,
    WorkflowConfig, WorkflowError,
};
use clinicrx_orders::{
    DiagnosticTestCatalog, InMemoryPrescriptionSource, InMemoryTestCatalog, PrescriptionSource,
};

use crate::app::errors::ApiError;

pub type SharedGateway = Arc<dyn PersistenceGateway>;
pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope>>;
pub type Workflow = BillingWorkflow<SharedGateway, SharedBus>;

/// Everything the handlers need.
pub struct AppServices {
    pub workflow: Workflow,
    pub prescriptions: Arc<dyn PrescriptionSource>,
    pub catalog: Arc<dyn DiagnosticTestCatalog>,
}

impl AppServices {
    pub fn new(
        gateway: SharedGateway,
        bus: SharedBus,
        config: WorkflowConfig,
        prescriptions: Arc<dyn PrescriptionSource>,
        catalog: Arc<dyn DiagnosticTestCatalog>,
    ) -> Result<Self, WorkflowError> {
        Ok(Self {
            workflow: BillingWorkflow::open(gateway, bus, config)?,
            prescriptions,
            catalog,
        })
    }

    /// Run a synchronous engine call on the blocking pool.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&AppServices) -> Result<T, ApiError> + Send + 'static,
    {
        let services = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&services))
            .await
            .map_err(|err| ApiError::Internal(format!("engine task failed: {err}")))?
    }
}

/// Wire the engine from settings: store backend, allocation policy, external sources.
pub fn build_services(settings: &Settings) -> Result<AppServices, WorkflowError> {
    let gateway: SharedGateway = match settings.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryGateway::new()),
        StoreBackend::JsonFile => Arc::new(JsonFileGateway::new(&settings.store.path)),
    };

    let prescriptions: Arc<dyn PrescriptionSource> = match &settings.sources.prescriptions {
        Some(path) => Arc::new(load_prescriptions(path)?),
        None => Arc::new(InMemoryPrescriptionSource::new()),
    };
    let catalog: Arc<dyn DiagnosticTestCatalog> = match &settings.sources.test_catalog {
        Some(path) => Arc::new(load_test_catalog(path)?),
        None => Arc::new(InMemoryTestCatalog::new()),
    };

    tracing::info!(
        backend = ?settings.store.backend,
        allocation = ?settings.billing.allocation,
        "billing services configured"
    );

    AppServices::new(
        gateway,
        Arc::new(InMemoryEventBus::new()),
        WorkflowConfig {
            allocation: settings.billing.allocation,
        },
        prescriptions,
        catalog,
    )
}
