use std::path::PathBuf;

use serde::Serialize;

use crate::error::ParseError;
use crate::pairs::parse_pairs;

/// Transformation class named in a problem file. Whether a class is
/// actually runnable is decided by the search engine's registry; the parser
/// accepts every name the format defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransformRequest {
    Projective,
    Similarity,
    Affine,
    Rigid,
    Translation,
}

impl TransformRequest {
    pub fn name(self) -> &'static str {
        match self {
            TransformRequest::Projective => "projective",
            TransformRequest::Similarity => "similarity",
            TransformRequest::Affine => "affine",
            TransformRequest::Rigid => "rigid",
            TransformRequest::Translation => "translate",
        }
    }
}

/// A parsed problem description. Paths are kept as written; the caller
/// resolves and loads them.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemConfig {
    pub model: PathBuf,
    pub data: PathBuf,
    pub transform: TransformRequest,
    pub sigma: f64,
    pub instances: usize,
    pub spurious: bool,
    pub scale: f64,
    pub solution: Option<Vec<(usize, usize)>>,
    pub name: Option<String>,
}

/// Parse a problem property file: one `key=value` per line. Lines starting
/// with `#` or `;`, or shorter than 3 characters, are skipped. Unrecognized
/// keys are ignored so problem files can carry annotations.
pub fn parse_problem(input: &str) -> Result<ProblemConfig, ParseError> {
    let mut model = None;
    let mut data = None;
    let mut transform = TransformRequest::Projective;
    let mut sigma = 5.0;
    let mut instances = 1;
    let mut spurious = true;
    let mut scale = 2.0;
    let mut solution = None;
    let mut name = None;

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        if raw.starts_with('#') || raw.starts_with(';') || raw.len() < 3 {
            continue;
        }
        let Some((key, value)) = raw.split_once('=') else {
            return Err(ParseError::MissingEquals { line });
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "model" => model = Some(PathBuf::from(value)),
            "data" => data = Some(PathBuf::from(value)),
            "transform" => {
                transform = match value {
                    "projective" => TransformRequest::Projective,
                    "similarity" => TransformRequest::Similarity,
                    "affine" => TransformRequest::Affine,
                    "rigid" => TransformRequest::Rigid,
                    "translate" => TransformRequest::Translation,
                    _ => {
                        return Err(ParseError::UnknownTransform {
                            value: value.to_string(),
                            line,
                        });
                    }
                }
            }
            "sigma" => sigma = parse_number(value, "sigma", line)?,
            "scale" => scale = parse_number(value, "scale", line)?,
            "instances" => {
                instances = value.parse().map_err(|_| ParseError::InvalidValue {
                    key: "instances",
                    value: value.to_string(),
                    line,
                })?
            }
            "spurious" => {
                let flag: i64 = value.parse().map_err(|_| ParseError::InvalidValue {
                    key: "spurious",
                    value: value.to_string(),
                    line,
                })?;
                spurious = flag != 0;
            }
            "solution" => solution = Some(parse_pairs(value)?),
            "name" => name = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(ProblemConfig {
        model: model.ok_or(ParseError::MissingKey { key: "model" })?,
        data: data.ok_or(ParseError::MissingKey { key: "data" })?,
        transform,
        sigma,
        instances,
        spurious,
        scale,
        solution,
        name,
    })
}

fn parse_number(value: &str, key: &'static str, line: usize) -> Result<f64, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key,
        value: value.to_string(),
        line,
    })
}
