pub mod error;
pub mod pairs;
pub mod points;
pub mod problem;

pub use error::ParseError;
pub use pairs::parse_pairs;
pub use points::{PointFile, parse_points};
pub use problem::{ProblemConfig, TransformRequest, parse_problem};
