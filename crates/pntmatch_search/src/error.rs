use std::path::PathBuf;

use pntmatch_parser::{ParseError, TransformRequest};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("transform class '{}' is not implemented", .0.name())]
    UnsupportedTransform(TransformRequest),

    #[error("key features need between 2 and {max} pairs per feature (got {got})")]
    KeyFeatureSize { got: usize, max: usize },
}
