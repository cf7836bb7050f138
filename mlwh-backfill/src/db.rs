pub mod error;
pub mod model;
#[cfg(test)]
pub(crate) mod test_util;
mod util;

use chrono::NaiveDateTime;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use util::BoxedDieselExpression;

pub use model::pac_bio::{
    Column, ProductMetricsProductId, RowQuery, RunWell, TaggedRunWell, WellMetricsProductId,
};

trait AsDieselFilter<QuerySource = ()> {
    fn as_diesel_filter<'a>(&'a self) -> Option<BoxedDieselExpression<'a, QuerySource>>
    where
        QuerySource: 'a;
}

trait AsDieselQueryBase {
    type QueryBase;

    fn as_diesel_query_base() -> Self::QueryBase;
}

pub trait Write {
    type Returns;

    fn write(
        self,
        db_conn: &mut AsyncPgConnection,
    ) -> impl Future<Output = error::Result<Self::Returns>> + Send;
}

pub trait FetchByQuery: Sized {
    type QueryParams;

    fn fetch_by_query(
        query: &Self::QueryParams,
        db_conn: &mut AsyncPgConnection,
    ) -> impl Future<Output = error::Result<Vec<Self>>> + Send;
}

/// An exclusive interval of `pac_bio_run.recorded_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    #[must_use]
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }
}

/// Fetches joined run, product metrics and run well metrics rows matching
/// `query`, projected onto `Row`.
///
/// # Errors
/// Any error reported by the database is returned unchanged.
pub async fn get_rows<Row>(query: &RowQuery, db_conn: &mut AsyncPgConnection) -> error::Result<Vec<Row>>
where
    Row: FetchByQuery<QueryParams = RowQuery>,
{
    Row::fetch_by_query(query, db_conn).await
}

/// # Errors
pub async fn connect(db_url: &str) -> error::Result<AsyncPgConnection> {
    Ok(AsyncPgConnection::establish(db_url).await?)
}
