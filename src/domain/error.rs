//! Domain error types.
//!
//! Construction-time problems (bad parameters, broken wiring, unparsable
//! expressions) are reported through [`LineflowError`]. Evaluation never
//! fails: degenerate arithmetic yields NaN and short history withholds output.

/// A parse error with position information for indicator expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!("{input}\n{caret}\n{err}", err = self)
    }
}

/// Top-level error type for lineflow.
#[derive(Debug, thiserror::Error)]
pub enum LineflowError {
    #[error("{indicator}: invalid parameter '{param}': {reason}")]
    Param {
        indicator: String,
        param: String,
        reason: String,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown indicator '{name}'")]
    UnknownIndicator { name: String },

    #[error("{indicator}: expected {expected} input(s), found {found}")]
    MissingInput {
        indicator: String,
        expected: String,
        found: usize,
    },

    #[error("{indicator} has no line '{line}'")]
    UnknownLine { indicator: String, line: String },

    #[error("unknown reference '{name}'")]
    UnknownReference { name: String },

    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("line '{line}' is written retroactively and cannot feed another node")]
    RetroactiveInput { line: String },

    #[error("line id {id} does not belong to this graph")]
    InvalidLine { id: usize },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LineflowError {
    pub(crate) fn param(
        indicator: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LineflowError::Param {
            indicator: indicator.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// True for wiring problems (cycles, missing inputs, unknown names).
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            LineflowError::UnknownIndicator { .. }
                | LineflowError::MissingInput { .. }
                | LineflowError::UnknownLine { .. }
                | LineflowError::UnknownReference { .. }
                | LineflowError::Cycle { .. }
                | LineflowError::RetroactiveInput { .. }
                | LineflowError::InvalidLine { .. }
        )
    }
}

impl From<&LineflowError> for std::process::ExitCode {
    fn from(err: &LineflowError) -> Self {
        let code: u8 = match err {
            LineflowError::Io(_) => 1,
            LineflowError::ConfigParse { .. }
            | LineflowError::ConfigMissing { .. }
            | LineflowError::ConfigInvalid { .. }
            | LineflowError::Param { .. } => 2,
            LineflowError::UnknownIndicator { .. }
            | LineflowError::MissingInput { .. }
            | LineflowError::UnknownLine { .. }
            | LineflowError::UnknownReference { .. }
            | LineflowError::Cycle { .. }
            | LineflowError::RetroactiveInput { .. }
            | LineflowError::InvalidLine { .. } => 3,
            LineflowError::Parse(_) => 4,
            LineflowError::NoData { .. } | LineflowError::Data { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
