use std::sync::LazyLock;

use diesel::result::DatabaseErrorInformation;
use regex::Regex;

static DETAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Key \((.+)\)=\((.+)\).+").expect("detail regex is valid"));

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{entity} already has a row with {} = {}", field.clone().unwrap_or_default(), value.clone().unwrap_or_default())]
    DuplicateProductId {
        entity: String,
        field: Option<String>,
        value: Option<String>,
    },
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    fn from_other_error(err: impl std::error::Error) -> Self {
        Self::Other {
            message: format!("{err:?}"),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(kind, info) => Self::from((kind, info)),
            _ => Self::from_other_error(err),
        }
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::from_other_error(err)
    }
}

impl
    From<(
        diesel::result::DatabaseErrorKind,
        Box<dyn DatabaseErrorInformation + Send + Sync>,
    )> for Error
{
    fn from(
        (kind, info): (
            diesel::result::DatabaseErrorKind,
            Box<dyn DatabaseErrorInformation + Send + Sync>,
        ),
    ) -> Self {
        use diesel::result::DatabaseErrorKind::UniqueViolation;

        if !matches!(kind, UniqueViolation) {
            return Self::from_other_error(diesel::result::Error::DatabaseError(kind, info));
        }

        let entity = info.table_name().unwrap_or_default().to_string();
        let details = info.details().unwrap_or_default();
        let (field, value) = DETAIL_REGEX
            .captures(details)
            .map(|cap| {
                (
                    cap.get(1).map(|m| m.as_str().to_string()),
                    cap.get(2).map(|m| m.as_str().to_string()),
                )
            })
            .unwrap_or_default();

        Self::DuplicateProductId {
            entity,
            field,
            value,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
