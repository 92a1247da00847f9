//! Process-level wiring of client, repositories and managers.
//!
//! # Responsibility
//! - Open one shared client and hand a handle to every repository.
//! - Give the company repository read-only category lookup.
//! - Stop every repository on shutdown and report all failures together.
//!
//! # Invariants
//! - Construction is all-or-nothing: a schema failure aborts `open`.
//! - Stopping one repository never affects the lookup held by another.

use crate::config::{Config, ConfigError};
use crate::db::schema::SchemaError;
use crate::db::{Client, DbError, Deadline, SCHEMA_SETUP_TIMEOUT};
use crate::error::{RepoError, RepoResult};
use crate::manager::{BuildingManager, CategoryManager, CompanyManager};
use crate::model::Category;
use crate::repo::{
    CategoryLookup, CategoryRepository, SqliteBuildingRepository, SqliteCategoryRepository,
    SqliteCompanyRepository,
};
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("connect database: {0}")]
    Connect(#[source] DbError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Every repository that failed to stop, in stop order.
#[derive(Debug)]
pub struct StopError {
    pub failures: Vec<(&'static str, DbError)>,
}

impl Display for StopError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to stop {} repositories:", self.failures.len())?;
        for (name, err) in &self.failures {
            write!(f, " {name}: {err};")?;
        }
        Ok(())
    }
}

impl std::error::Error for StopError {}

pub type Buildings = BuildingManager<Arc<SqliteBuildingRepository>>;
pub type Categories = CategoryManager<Arc<SqliteCategoryRepository>>;
pub type Companies = CompanyManager<Arc<SqliteCompanyRepository>>;

/// Fully wired data-access layer.
pub struct Catalog {
    config: Config,
    category_repo: Arc<SqliteCategoryRepository>,
    building_repo: Arc<SqliteBuildingRepository>,
    company_repo: Arc<SqliteCompanyRepository>,
    buildings: Buildings,
    categories: Categories,
    companies: Companies,
}

impl Catalog {
    /// Validates `config`, connects and builds every repository.
    ///
    /// The category repository is built first; the company repository
    /// receives it as its `CategoryLookup`.
    pub fn open(config: &Config) -> Result<Self, BootstrapError> {
        let started_at = Instant::now();
        config.validate()?;

        let client = Client::connect(&config.db, &Deadline::after(SCHEMA_SETUP_TIMEOUT))
            .map_err(BootstrapError::Connect)?;

        let category_repo = Arc::new(SqliteCategoryRepository::try_new(client.clone())?);
        let building_repo = Arc::new(SqliteBuildingRepository::try_new(client.clone())?);
        let lookup: Arc<dyn CategoryLookup> = category_repo.clone();
        let company_repo = Arc::new(SqliteCompanyRepository::try_new(client, lookup)?);

        info!(
            "event=catalog_open module=app status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            config: config.clone(),
            buildings: BuildingManager::new(Arc::clone(&building_repo)),
            categories: CategoryManager::new(Arc::clone(&category_repo)),
            companies: CompanyManager::new(Arc::clone(&company_repo)),
            category_repo,
            building_repo,
            company_repo,
        })
    }

    pub fn buildings(&self) -> &Buildings {
        &self.buildings
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn companies(&self) -> &Companies {
        &self.companies
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Inserts the configured seed categories when none exist yet.
    ///
    /// Returns how many categories were inserted. Seed paths already present
    /// are skipped, so a partially seeded store converges on rerun.
    pub fn seed_if_empty(&self, deadline: &Deadline) -> RepoResult<usize> {
        if !self.category_repo.is_empty(deadline)? {
            info!("event=seed module=app status=skipped reason=not_empty");
            return Ok(0);
        }

        let paths = self.config.seed_categories().map_err(|err| {
            warn!("event=seed module=app status=error error={err}");
            RepoError::Storage
        })?;

        let mut inserted = 0;
        for path in paths {
            match self.category_repo.insert(deadline, &Category::new(path)) {
                Ok(()) => inserted += 1,
                Err(RepoError::Duplicate { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        info!("event=seed module=app status=ok inserted={inserted}");
        Ok(inserted)
    }

    /// Stops every repository. Failures are collected, not short-circuited.
    pub fn stop(&self, deadline: &Deadline) -> Result<(), StopError> {
        let attempts = [
            ("companies", self.company_repo.stop(deadline)),
            ("buildings", self.building_repo.stop(deadline)),
            ("categories", self.category_repo.stop(deadline)),
        ];

        let failures: Vec<_> = attempts
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|err| (name, err)))
            .collect();

        if failures.is_empty() {
            info!("event=catalog_stop module=app status=ok");
            return Ok(());
        }
        for (name, err) in &failures {
            warn!("event=catalog_stop module=app status=error repo={name} error={err}");
        }
        Err(StopError { failures })
    }
}
