pub(crate) use miette::{IntoDiagnostic, Report, Result, SourceOffset, miette};

// Nightly requires enabling this feature:
// #![feature(error_generic_member_access)]
#[derive(Debug, derive_more::Error, derive_more::Display, miette::Diagnostic)]
#[non_exhaustive]
pub(crate) enum Error {
    #[display("config file not found: {path}")]
    ConfigNotFound { path: String },
    #[display("invalid configuration: {}", _0)]
    #[diagnostic(help("see `stream-loader --help` or the base configuration"))]
    InvalidConfig(#[error(ignore)] String),
    #[display("unsupported scheme for input url: {url}")]
    UnsupportedInputUrl { url: String },
    #[display("record is not a json object")]
    NotAnObject,
    #[display("missing or non-string field '{}' in record", _0)]
    MissingField(#[error(ignore)] &'static str),
    #[display("malformed json provided")]
    Serde {
        cause: serde_json::Error,
        #[source_code]
        input: String,
        #[label("{cause}")]
        location: SourceOffset,
    },
}

impl Error {
    /// Takes the input and the `serde_json::Error` and returns a `Error::Serde`
    /// that can be rendered nicely with miette.
    /// ```ignore
    /// serde_json::from_str(&input).map_err(|cause| Error::from_serde_error(input, cause))?
    /// ```
    pub fn from_serde_error(input: impl Into<String>, cause: serde_json::Error) -> Self {
        let input = input.into();
        let location = SourceOffset::from_location(&input, cause.line(), cause.column());
        Self::Serde { cause, input, location }
    }
}

/// Failure reported by a sink when a record is submitted.
///
/// The split drives how workers log the failure, neither kind is retried.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub(crate) enum SinkError {
    /// The engine understood the payload but refused it (unknown data source, bad attribute,...).
    #[display("record rejected: {}", _0)]
    Validation(#[error(ignore)] String),
    /// Internal failure of the engine or of the transport to reach it.
    #[display("engine failure: {}", _0)]
    Engine(#[error(ignore)] String),
}
