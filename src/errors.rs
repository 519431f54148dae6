use thiserror::Error;

fn format_undefined(names: &[String]) -> String {
    match names {
        [single] => format!("'{}' is not defined in the unit registry.", single),
        many => format!("{:?} are not defined in the unit registry.", many),
    }
}

fn format_dimensionality(from: &str, to: &str, from_dim: &Option<String>, to_dim: &Option<String>) -> String {
    match (from_dim, to_dim) {
        (Some(fd), Some(td)) => format!(
            "Cannot convert from '{}' ({}) to '{}' ({}).",
            from, fd, to, td
        ),
        _ => format!("Cannot convert from '{}' to '{}'.", from, to),
    }
}

/// Errors raised by the registry, parser and quantity arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitsError {
    #[error("{}", format_undefined(.0))]
    UndefinedUnit(Vec<String>),

    #[error("{}", format_dimensionality(from, to, from_dim, to_dim))]
    Dimensionality {
        from: String,
        to: String,
        from_dim: Option<String>,
        to_dim: Option<String>,
    },

    #[error(
        "Cannot convert: offset unit '{unit}' is not standalone in '{units}' (offset-unit not standalone)."
    )]
    OffsetUnitNotStandalone { unit: String, units: String },

    #[error("Error during parsing: {message}")]
    Parse { message: String },

    #[error("Malformed definition in {file}:{line}: {message}")]
    Definition {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Unit '{name}' already exists in the registry")]
    AlreadyRegistered { name: String },
}

impl UnitsError {
    pub fn undefined(name: impl Into<String>) -> Self {
        UnitsError::UndefinedUnit(vec![name.into()])
    }

    pub fn undefined_many(names: impl IntoIterator<Item = String>) -> Self {
        UnitsError::UndefinedUnit(names.into_iter().collect())
    }

    pub fn dimensionality(from: impl Into<String>, to: impl Into<String>) -> Self {
        UnitsError::Dimensionality {
            from: from.into(),
            to: to.into(),
            from_dim: None,
            to_dim: None,
        }
    }

    pub fn dimensionality_with_dims(
        from: impl Into<String>,
        to: impl Into<String>,
        from_dim: impl Into<String>,
        to_dim: impl Into<String>,
    ) -> Self {
        UnitsError::Dimensionality {
            from: from.into(),
            to: to.into(),
            from_dim: Some(from_dim.into()),
            to_dim: Some(to_dim.into()),
        }
    }
}
