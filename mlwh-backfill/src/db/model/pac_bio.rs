use diesel::{dsl::InnerJoin, pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use mlwh_schema::{pac_bio_product_metrics, pac_bio_run, pac_bio_run_well_metrics};

use crate::db::{
    AsDieselFilter, AsDieselQueryBase, FetchByQuery, TimeWindow, error,
    util::{BoxedDieselExpression, DieselExpressionBuilder},
};

/// Columns of the joined PacBio tables that a [`RowQuery`] can require to be
/// NULL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    RunName,
    WellLabel,
    TagSequence,
    Tag2Sequence,
    WellMetricsProductId,
    ProductMetricsProductId,
}

/// Selects the rows of `pac_bio_run` recorded strictly inside `window`,
/// joined to their product metrics and run well metrics. Every column in
/// `exclude` must be NULL for a row to be returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub window: TimeWindow,
    pub exclude: Vec<Column>,
}

impl RowQuery {
    #[must_use]
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn exclude(mut self, column: Column) -> Self {
        self.exclude.push(column);
        self
    }
}

impl<QuerySource> AsDieselFilter<QuerySource> for RowQuery
where
    pac_bio_run::recorded_at: SelectableExpression<QuerySource>,
    pac_bio_run::pac_bio_run_name: SelectableExpression<QuerySource>,
    pac_bio_run::well_label: SelectableExpression<QuerySource>,
    pac_bio_run::tag_sequence: SelectableExpression<QuerySource>,
    pac_bio_run::tag2_sequence: SelectableExpression<QuerySource>,
    pac_bio_run_well_metrics::id_pac_bio_product: SelectableExpression<QuerySource>,
    pac_bio_product_metrics::id_pac_bio_product: SelectableExpression<QuerySource>,
{
    fn as_diesel_filter<'a>(&'a self) -> Option<BoxedDieselExpression<'a, QuerySource>>
    where
        QuerySource: 'a,
    {
        use pac_bio_run::recorded_at;

        let Self {
            window: TimeWindow { start, end },
            exclude,
        } = self;

        let mut query = DieselExpressionBuilder::default()
            .and(recorded_at.gt(start))
            .and(recorded_at.lt(end));

        for column in exclude {
            query = match column {
                Column::RunName => query.and(pac_bio_run::pac_bio_run_name.is_null()),
                Column::WellLabel => query.and(pac_bio_run::well_label.is_null()),
                Column::TagSequence => query.and(pac_bio_run::tag_sequence.is_null()),
                Column::Tag2Sequence => query.and(pac_bio_run::tag2_sequence.is_null()),
                Column::WellMetricsProductId => {
                    query.and(pac_bio_run_well_metrics::id_pac_bio_product.is_null())
                }
                Column::ProductMetricsProductId => {
                    query.and(pac_bio_product_metrics::id_pac_bio_product.is_null())
                }
            };
        }

        query.build()
    }
}

/// The default projection: the run name and well label of each row
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq, Hash)]
#[diesel(table_name = pac_bio_run, check_for_backend(Pg))]
pub struct RunWell {
    #[diesel(column_name = pac_bio_run_name)]
    pub run_name: Option<String>,
    pub well_label: String,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq, Hash)]
#[diesel(table_name = pac_bio_run, check_for_backend(Pg))]
pub struct TaggedRunWell {
    #[diesel(column_name = pac_bio_run_name)]
    pub run_name: Option<String>,
    pub well_label: String,
    pub tag_sequence: Option<String>,
    pub tag2_sequence: Option<String>,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = pac_bio_run_well_metrics, check_for_backend(Pg))]
pub struct WellMetricsProductId {
    #[diesel(column_name = id_pac_bio_product)]
    pub product_id: Option<String>,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = pac_bio_product_metrics, check_for_backend(Pg))]
pub struct ProductMetricsProductId {
    #[diesel(column_name = id_pac_bio_product)]
    pub product_id: Option<String>,
}

impl AsDieselQueryBase for RunWell {
    type QueryBase = InnerJoin<
        InnerJoin<pac_bio_product_metrics::table, pac_bio_run::table>,
        pac_bio_run_well_metrics::table,
    >;

    fn as_diesel_query_base() -> Self::QueryBase {
        pac_bio_product_metrics::table
            .inner_join(pac_bio_run::table)
            .inner_join(pac_bio_run_well_metrics::table)
    }
}

impl AsDieselQueryBase for TaggedRunWell {
    type QueryBase = <RunWell as AsDieselQueryBase>::QueryBase;

    fn as_diesel_query_base() -> Self::QueryBase {
        RunWell::as_diesel_query_base()
    }
}

impl AsDieselQueryBase for WellMetricsProductId {
    type QueryBase = <RunWell as AsDieselQueryBase>::QueryBase;

    fn as_diesel_query_base() -> Self::QueryBase {
        RunWell::as_diesel_query_base()
    }
}

impl AsDieselQueryBase for ProductMetricsProductId {
    type QueryBase = <RunWell as AsDieselQueryBase>::QueryBase;

    fn as_diesel_query_base() -> Self::QueryBase {
        RunWell::as_diesel_query_base()
    }
}

macro_rules! fetch_joined_rows {
    ($query:ident, $db_conn:ident) => {{
        let mut statement = Self::as_diesel_query_base()
            .select(Self::as_select())
            .order_by(pac_bio_run::id_pac_bio_tmp)
            .into_boxed();

        if let Some(filter) = $query.as_diesel_filter() {
            statement = statement.filter(filter);
        }

        tracing::debug!(
            query = %diesel::debug_query::<Pg, _>(&statement),
            "running select query"
        );

        Ok(statement.load($db_conn).await?)
    }};
}

impl FetchByQuery for RunWell {
    type QueryParams = RowQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> error::Result<Vec<Self>> {
        fetch_joined_rows!(query, db_conn)
    }
}

impl FetchByQuery for TaggedRunWell {
    type QueryParams = RowQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> error::Result<Vec<Self>> {
        fetch_joined_rows!(query, db_conn)
    }
}

impl FetchByQuery for WellMetricsProductId {
    type QueryParams = RowQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> error::Result<Vec<Self>> {
        fetch_joined_rows!(query, db_conn)
    }
}

impl FetchByQuery for ProductMetricsProductId {
    type QueryParams = RowQuery;

    async fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> error::Result<Vec<Self>> {
        fetch_joined_rows!(query, db_conn)
    }
}
