//! The crawl pipeline: retrieve, filter, build, validate.

use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogBuilder};
use crate::config::{Config, CrawlOptions};
use crate::connection::Connection;
use crate::error::CrawlResult;
use crate::filter;
use crate::metadata::{MetadataProvider, Retriever};
use crate::session::Stage;

/// Crawl the database behind `connection` with options read from `config`.
///
/// Only connection failures, an invalid configuration and a catalog that
/// fails validation are errors. Everything else comes back as a (possibly
/// partial) catalog with warnings attached.
pub async fn crawl(connection: &dyn Connection, config: &Config) -> CrawlResult<Catalog> {
    let options = CrawlOptions::from_config(config)?;
    crawl_with(connection.metadata(), &options).await
}

/// [`crawl`] against any provider, with options already parsed.
pub async fn crawl_with(
    provider: &dyn MetadataProvider,
    options: &CrawlOptions,
) -> CrawlResult<Catalog> {
    crawl_staged(provider, options, |_| {}).await
}

/// The pipeline itself, reporting each completed stage to `reached`.
pub(crate) async fn crawl_staged(
    provider: &dyn MetadataProvider,
    options: &CrawlOptions,
    mut reached: impl FnMut(Stage),
) -> CrawlResult<Catalog> {
    let mut records = Retriever::new(provider, options).retrieve().await?;
    debug!(
        tables = records.tables.len(),
        routines = records.routines.len(),
        omitted = records.omitted.len(),
        "metadata retrieved"
    );
    reached(Stage::MetadataRetrieved);

    records.warnings.extend(options.rules.validate());
    let records = filter::apply(records, &options.rules);
    reached(Stage::Filtered);

    let catalog = CatalogBuilder::new(options).build(records);
    catalog.validate()?;
    reached(Stage::CatalogBuilt);

    info!(
        schemas = catalog.schemas.len(),
        tables = catalog.tables().count(),
        warnings = catalog.warnings.len(),
        "crawl complete"
    );
    Ok(catalog)
}
