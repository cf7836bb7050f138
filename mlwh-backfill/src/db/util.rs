use diesel::{pg::Pg, prelude::*, sql_types};
use itertools::Itertools;

pub(super) type BoxedDieselExpression<'a, QuerySource> =
    Box<dyn BoxableExpression<QuerySource, Pg, SqlType = sql_types::Bool> + 'a>;

pub(super) struct DieselExpressionBuilder<'a, QuerySource>(
    Option<BoxedDieselExpression<'a, QuerySource>>,
);
impl<QuerySource> Default for DieselExpressionBuilder<'_, QuerySource> {
    fn default() -> Self {
        Self(None)
    }
}

impl<'a, QuerySource: 'a> DieselExpressionBuilder<'a, QuerySource> {
    pub fn and<Q>(self, other: Q) -> Self
    where
        Q: BoxableExpression<QuerySource, Pg, SqlType = sql_types::Bool> + 'a,
    {
        let other: BoxedDieselExpression<QuerySource> = Box::new(other);

        let Self(Some(current)) = self else {
            return Self(Some(other));
        };

        let current = Box::new(current.and(other));

        Self(Some(current))
    }

    pub fn build(self) -> Option<BoxedDieselExpression<'a, QuerySource>> {
        let Self(query) = self;

        query
    }
}

/// Renders `n_rows` parenthesized groups of `n_columns` numbered bind
/// parameters, for use in a `values` list.
pub(super) fn values_placeholders(n_rows: usize, n_columns: usize) -> String {
    (0..n_rows)
        .map(|row| {
            let params = (1..=n_columns).map(|col| format!("${}", row * n_columns + col));
            format!("({})", params.format(", "))
        })
        .join(", ")
}
