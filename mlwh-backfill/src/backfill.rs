//! Computes product ids for PacBio rows that lack one and writes them back to
//! `pac_bio_run_well_metrics` and `pac_bio_product_metrics`.
//!
//! Both drivers select every matching row before anything is written, log one
//! line per selected row and then either stop (dry run) or apply all updates inside
//! a single transaction.

use std::fmt::{self, Display};

use diesel_async::{AsyncConnection, AsyncPgConnection, scoped_futures::ScopedFutureExt};
use itertools::Itertools;

use crate::{
    db::{self, Column, RowQuery, RunWell, TaggedRunWell, TimeWindow, Write, error},
    product_id::{self, PacBioEntity, combine_tags},
};

/// The product id computed for one run well
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WellProduct {
    pub run_name: String,
    pub well_label: String,
    pub product_id: String,
}

/// The product id computed for one tagged library in a run well
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedProduct {
    pub run_name: String,
    pub well_label: String,
    pub tag_sequence: Option<String>,
    pub tag2_sequence: Option<String>,
    pub product_id: String,
}

struct Quoted<'a>(Option<&'a str>);

impl Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(s) => write!(f, "'{s}'"),
            None => f.write_str("None"),
        }
    }
}

impl Display for WellProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            run_name,
            well_label,
            product_id,
        } = self;

        write!(
            f,
            "{{'run_name': '{run_name}', 'well_label': '{well_label}', 'product_id': '{product_id}'}}"
        )
    }
}

impl Display for TaggedProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            run_name,
            well_label,
            tag_sequence,
            tag2_sequence,
            product_id,
        } = self;

        write!(
            f,
            "{{'run_name': '{run_name}', 'well_label': '{well_label}', 'tag_sequence': {}, 'tag2_sequence': {}, 'product_id': '{product_id}'}}",
            Quoted(tag_sequence.as_deref()),
            Quoted(tag2_sequence.as_deref()),
        )
    }
}

fn hash(run_name: &str, well_label: &str, tags: Option<&str>) -> product_id::Result<String> {
    PacBioEntity::new(run_name, well_label, tags)?.hash_product_id()
}

/// Computes one [`WellProduct`] per distinct run well, logging every selected
/// row. Rows without a usable run name or well label are skipped with a
/// warning.
fn well_products(rows: Vec<RunWell>) -> Vec<WellProduct> {
    rows.into_iter()
        .filter_map(|RunWell { run_name, well_label }| {
            let Some(run_name) = run_name else {
                tracing::warn!(%well_label, "skipping row without a run name");
                return None;
            };

            match hash(&run_name, &well_label, None) {
                Ok(product_id) => Some(WellProduct {
                    run_name,
                    well_label,
                    product_id,
                }),
                Err(error) => {
                    tracing::warn!(%error, %run_name, %well_label, "skipping row");
                    None
                }
            }
        })
        .inspect(|product| tracing::info!("Backfilling id for {product}"))
        .unique()
        .collect()
}

/// Computes one [`TaggedProduct`] per distinct library. The tag sequences of
/// a library are combined into a single descriptor before hashing.
fn tagged_products(rows: Vec<TaggedRunWell>) -> Vec<TaggedProduct> {
    rows.into_iter()
        .filter_map(
            |TaggedRunWell {
                 run_name,
                 well_label,
                 tag_sequence,
                 tag2_sequence,
             }| {
                let Some(run_name) = run_name else {
                    tracing::warn!(%well_label, "skipping row without a run name");
                    return None;
                };

                let tags = combine_tags(tag_sequence.as_deref(), tag2_sequence.as_deref());

                match hash(&run_name, &well_label, tags.as_deref()) {
                    Ok(product_id) => Some(TaggedProduct {
                        run_name,
                        well_label,
                        tag_sequence,
                        tag2_sequence,
                        product_id,
                    }),
                    Err(error) => {
                        tracing::warn!(%error, %run_name, %well_label, "skipping row");
                        None
                    }
                }
            },
        )
        .inspect(|product| tracing::info!("Backfilling id for {product}"))
        .unique()
        .collect()
}

async fn write_in_transaction<W>(
    update: W,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<W::Returns>
where
    W: Write + Send + 'static,
    W::Returns: Send + 'static,
{
    db_conn
        .transaction::<_, error::Error, _>(|conn| async move { update.write(conn).await }.scope_boxed())
        .await
}

/// Fills `pac_bio_run_well_metrics.id_pac_bio_product` for every run well
/// recorded strictly inside `window` that has none, returning the products
/// that were (or, for a dry run, would have been) written.
///
/// # Errors
/// Any database error is returned and, outside a dry run, rolls back every
/// update made by this call.
#[tracing::instrument(skip(db_conn))]
pub async fn backfill_rw_metrics(
    db_conn: &mut AsyncPgConnection,
    window: TimeWindow,
    dry_run: bool,
) -> error::Result<Vec<WellProduct>> {
    let query = RowQuery::new(window).exclude(Column::WellMetricsProductId);
    let rows: Vec<RunWell> = db::get_rows(&query, db_conn).await?;
    tracing::info!("{} rows found requiring backfill", rows.len());

    let products = well_products(rows);

    if dry_run {
        tracing::info!(n_products = products.len(), "dry run, nothing written");
        return Ok(products);
    }

    let n_updated = write_in_transaction(products.clone(), db_conn).await?;
    tracing::info!(n_updated, "committed run well metrics product ids");

    Ok(products)
}

/// Fills `pac_bio_product_metrics.id_pac_bio_product` for every library
/// recorded strictly inside `window` that has none, returning the products
/// that were (or, for a dry run, would have been) written.
///
/// # Errors
/// Any database error is returned and, outside a dry run, rolls back every
/// update made by this call.
#[tracing::instrument(skip(db_conn))]
pub async fn backfill_product_metrics(
    db_conn: &mut AsyncPgConnection,
    window: TimeWindow,
    dry_run: bool,
) -> error::Result<Vec<TaggedProduct>> {
    let query = RowQuery::new(window).exclude(Column::ProductMetricsProductId);
    let rows: Vec<TaggedRunWell> = db::get_rows(&query, db_conn).await?;
    tracing::info!("{} rows found requiring backfill", rows.len());

    let products = tagged_products(rows);

    if dry_run {
        tracing::info!(n_products = products.len(), "dry run, nothing written");
        return Ok(products);
    }

    let n_updated = write_in_transaction(products.clone(), db_conn).await?;
    tracing::info!(n_updated, "committed product metrics product ids");

    Ok(products)
}
