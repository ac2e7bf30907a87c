//! Runtime database handle: driver, registry, config and metrics sink.

pub mod commit;
pub mod query;
pub(crate) mod relation;
pub mod session;
pub mod store;

use crate::{
    config::DbConfig,
    db::{commit::Transaction, session::Table, store::StoreDriver},
    error::Error,
    model::{entity::EntityModel, registry::MetadataRegistry},
    obs::sink::{MetricsEvent, MetricsSink},
};
use std::{fmt, sync::Arc};

///
/// Db
///
/// Entry point for every read and write. Cheap to clone; the registry is
/// frozen once it is handed over, so every clone sees the same models.
///

#[derive(Clone)]
pub struct Db {
    driver: Arc<dyn StoreDriver>,
    registry: Arc<MetadataRegistry>,
    config: Arc<DbConfig>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl Db {
    #[must_use]
    pub fn new(driver: Arc<dyn StoreDriver>, registry: MetadataRegistry) -> Self {
        Self {
            driver,
            registry: Arc::new(registry),
            config: Arc::new(DbConfig::default()),
            metrics: None,
        }
    }

    /// Replace the configuration after validating it.
    pub fn with_config(mut self, config: DbConfig) -> Result<Self, Error> {
        config.validate()?;
        self.config = Arc::new(config);

        Ok(self)
    }

    #[must_use]
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub fn driver(&self) -> &dyn StoreDriver {
        self.driver.as_ref()
    }

    /// Query facade for one registered entity type.
    pub fn table(&self, type_name: &str) -> Result<Table<'_>, Error> {
        let model = self.registry.resolve(type_name)?;

        Ok(Table::new(self, model))
    }

    /// Open an empty transaction.
    #[must_use]
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Run `work` against a fresh transaction; commit on `Ok`, discard on `Err`.
    ///
    /// `work` is async so it can read through the handle before queueing.
    pub async fn transaction<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: AsyncFnOnce(&mut Transaction<'_>) -> Result<T, Error>,
    {
        let mut tx = self.begin();

        match work(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tx.discard();
                Err(err)
            }
        }
    }

    /// Physical table name for a model, with the configured prefix.
    pub(crate) fn table_name(&self, model: &EntityModel) -> String {
        self.config.table_name(model.storage_name())
    }

    pub(crate) fn record(&self, event: MetricsEvent<'_>) {
        if let Some(sink) = &self.metrics {
            sink.record(event);
        }
    }
}
