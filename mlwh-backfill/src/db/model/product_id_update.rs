use diesel::{
    pg::Pg,
    sql_types::{Nullable, Text},
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    backfill::{TaggedProduct, WellProduct},
    db::{Write, error, util::values_placeholders},
};

// Five bound values per row keeps a full chunk well under the Postgres limit
// of 65535 bind parameters per statement.
const MAX_ROWS_PER_STATEMENT: usize = 5000;
const _: () = assert!(MAX_ROWS_PER_STATEMENT * 5 < 65_535);

const RUN_WELL_METRICS_UPDATE: &str = "
update pac_bio_run_well_metrics as rwm
set id_pac_bio_product = v.product_id
from pac_bio_product_metrics as pm,
    pac_bio_run as r,
    (values {values}) as v (run_name, well_label, product_id)
where rwm.id_pac_bio_rw_metrics_tmp = pm.id_pac_bio_rw_metrics_tmp
    and pm.id_pac_bio_tmp = r.id_pac_bio_tmp
    and r.pac_bio_run_name = v.run_name
    and r.well_label = v.well_label
    and rwm.id_pac_bio_product is null";

const PRODUCT_METRICS_UPDATE: &str = "
update pac_bio_product_metrics as pm
set id_pac_bio_product = v.product_id
from pac_bio_run as r,
    (values {values}) as v (run_name, well_label, tag_sequence, tag2_sequence, product_id)
where pm.id_pac_bio_tmp = r.id_pac_bio_tmp
    and r.pac_bio_run_name = v.run_name
    and r.well_label = v.well_label
    and r.tag_sequence is not distinct from v.tag_sequence
    and r.tag2_sequence is not distinct from v.tag2_sequence
    and pm.id_pac_bio_product is null";

fn statement(template: &str, n_rows: usize, n_columns: usize) -> String {
    template.replace("{values}", &values_placeholders(n_rows, n_columns))
}

pub(crate) async fn update_well_metrics(
    products: &[WellProduct],
    rows_per_statement: usize,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<usize> {
    let mut n_updated = 0;

    for chunk in products.chunks(rows_per_statement) {
        let sql = statement(RUN_WELL_METRICS_UPDATE, chunk.len(), 3);
        let mut query = diesel::sql_query(sql).into_boxed::<Pg>();

        for WellProduct {
            run_name,
            well_label,
            product_id,
        } in chunk
        {
            query = query
                .bind::<Text, _>(run_name.as_str())
                .bind::<Text, _>(well_label.as_str())
                .bind::<Text, _>(product_id.as_str());
        }

        tracing::debug!(
            query = %diesel::debug_query::<Pg, _>(&query),
            "running update query"
        );

        n_updated += query.execute(db_conn).await?;
    }

    tracing::debug!(n_updated, "updated pac_bio_run_well_metrics");

    Ok(n_updated)
}

pub(crate) async fn update_product_metrics(
    products: &[TaggedProduct],
    rows_per_statement: usize,
    db_conn: &mut AsyncPgConnection,
) -> error::Result<usize> {
    let mut n_updated = 0;

    for chunk in products.chunks(rows_per_statement) {
        let sql = statement(PRODUCT_METRICS_UPDATE, chunk.len(), 5);
        let mut query = diesel::sql_query(sql).into_boxed::<Pg>();

        for TaggedProduct {
            run_name,
            well_label,
            tag_sequence,
            tag2_sequence,
            product_id,
        } in chunk
        {
            query = query
                .bind::<Text, _>(run_name.as_str())
                .bind::<Text, _>(well_label.as_str())
                .bind::<Nullable<Text>, _>(tag_sequence.as_deref())
                .bind::<Nullable<Text>, _>(tag2_sequence.as_deref())
                .bind::<Text, _>(product_id.as_str());
        }

        tracing::debug!(
            query = %diesel::debug_query::<Pg, _>(&query),
            "running update query"
        );

        n_updated += query.execute(db_conn).await?;
    }

    tracing::debug!(n_updated, "updated pac_bio_product_metrics");

    Ok(n_updated)
}

impl Write for Vec<WellProduct> {
    /// The number of `pac_bio_run_well_metrics` rows updated
    type Returns = usize;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        update_well_metrics(&self, MAX_ROWS_PER_STATEMENT, db_conn).await
    }
}

impl Write for Vec<TaggedProduct> {
    /// The number of `pac_bio_product_metrics` rows updated
    type Returns = usize;

    async fn write(self, db_conn: &mut AsyncPgConnection) -> error::Result<Self::Returns> {
        update_product_metrics(&self, MAX_ROWS_PER_STATEMENT, db_conn).await
    }
}
