use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_data(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidData {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn no_data() -> Error {
        Error(ErrorKind::NoData.into())
    }

    pub fn ambiguous_query(query: impl Into<String>) -> Error {
        Error(
            ErrorKind::AmbiguousQuery {
                query: query.into(),
            }
            .into(),
        )
    }

    pub fn incompatible_override(field: impl Into<String>) -> Error {
        Error(
            ErrorKind::IncompatibleOverride {
                field: field.into(),
            }
            .into(),
        )
    }

    pub fn unknown_override_type(name: impl Into<String>) -> Error {
        Error(ErrorKind::UnknownOverrideType { name: name.into() }.into())
    }

    pub fn group_by_mismatch(
        group_by: impl Into<String>,
        target: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::GroupByPathMismatch {
                group_by: group_by.into(),
                target: target.into(),
            }
            .into(),
        )
    }

    pub fn unsupported_conversion(field: impl Into<String>) -> Error {
        Error(
            ErrorKind::UnsupportedConversion {
                field: field.into(),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid subset data for '{element}': {message}")]
    InvalidData { element: String, message: String },

    #[error("no data was found")]
    NoData,

    #[error("query string must return 1 target, are you missing an index? {query}")]
    AmbiguousQuery { query: String },

    #[error(
        "conversions between numbers and strings are not supported, \
         see the export definition for \"{field}\""
    )]
    IncompatibleOverride { field: String },

    #[error("unknown or unsupported type {name}")]
    UnknownOverrideType { name: String },

    #[error(
        "the group-by field path {group_by} does not share a common path \
         with the target field path {target}"
    )]
    GroupByPathMismatch { group_by: String, target: String },

    #[error("cannot assign numeric data to the string container for \"{field}\"")]
    UnsupportedConversion { field: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
