use std::path::PathBuf;

use serde::Serialize;

use crate::error::ParseError;

/// Contents of a point file: optional header metadata plus the raw
/// coordinates in file order.
#[derive(Debug, Clone, Serialize)]
pub struct PointFile {
    pub name: Option<String>,
    pub image: Option<PathBuf>,
    pub points: Vec<(f64, f64)>,
}

/// Parse a point file. `#image <path>` and `#name <label>` headers are
/// recognized; other `#` lines and blank lines are skipped; every remaining
/// line must carry an `x y` coordinate pair.
pub fn parse_points(input: &str) -> Result<PointFile, ParseError> {
    let mut name = None;
    let mut image = None;
    let mut points = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let lineno = idx + 1;
        if line.starts_with('#') {
            let mut parts = line.splitn(2, char::is_whitespace);
            match parts.next() {
                Some("#image") => image = parts.next().map(|p| PathBuf::from(p.trim())),
                Some("#name") => name = parts.next().map(|n| n.trim().to_string()),
                _ => {}
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let pair = match (fields.next(), fields.next()) {
            (Some(x), Some(y)) => x.parse::<f64>().ok().zip(y.parse::<f64>().ok()),
            _ => None,
        };
        match pair {
            Some(p) => points.push(p),
            None => {
                return Err(ParseError::InvalidCoordinate {
                    text: line.trim().to_string(),
                    line: lineno,
                });
            }
        }
    }

    if points.is_empty() {
        return Err(ParseError::EmptyPointSet);
    }

    Ok(PointFile {
        name,
        image,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_points() {
        let input = "#name house\n#image imgs/house.ppm\n# a comment\n\n1.0 2.5\n-3 4e1\n";
        let file = parse_points(input).unwrap();
        assert_eq!(file.name.as_deref(), Some("house"));
        assert_eq!(file.image.as_deref(), Some(std::path::Path::new("imgs/house.ppm")));
        assert_eq!(file.points, vec![(1.0, 2.5), (-3.0, 40.0)]);
    }

    #[test]
    fn bad_coordinate_is_an_error() {
        let err = parse_points("1.0 2.0\n3.0 east\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidCoordinate { line: 2, .. }));
    }

    #[test]
    fn missing_second_coordinate_is_an_error() {
        assert!(matches!(
            parse_points("42\n"),
            Err(ParseError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(matches!(
            parse_points("#name nothing\n"),
            Err(ParseError::EmptyPointSet)
        ));
    }
}
