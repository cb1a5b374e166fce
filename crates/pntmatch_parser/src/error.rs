use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: expected `key=value`")]
    MissingEquals { line: usize },

    #[error("line {line}: unknown transform class '{value}'")]
    UnknownTransform { value: String, line: usize },

    #[error("line {line}: invalid {key} value '{value}'")]
    InvalidValue {
        key: &'static str,
        value: String,
        line: usize,
    },

    #[error("missing required key '{key}'")]
    MissingKey { key: &'static str },

    #[error("line {line}: invalid coordinate pair '{text}'")]
    InvalidCoordinate { text: String, line: usize },

    #[error("point file contains no points")]
    EmptyPointSet,

    #[error("pair list has an odd number of values")]
    UnbalancedPairs,

    #[error("invalid pair index '{text}'")]
    InvalidPairIndex { text: String },
}
