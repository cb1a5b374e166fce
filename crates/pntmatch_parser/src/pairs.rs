use unscanny::Scanner;

use crate::error::ParseError;

/// Parse a match literal like `(1,1) (2,2) (3,3)` into model/data index
/// pairs. Parentheses, commas, and whitespace all act as separators; the
/// values are taken two at a time. Pairs come back sorted by model index.
pub fn parse_pairs(input: &str) -> Result<Vec<(usize, usize)>, ParseError> {
    let mut s = Scanner::new(input);
    let mut values: Vec<usize> = Vec::new();

    loop {
        s.eat_while(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ','));
        let token = s.eat_while(|c: char| c.is_ascii_digit());
        if token.is_empty() {
            if !s.done() {
                return Err(ParseError::InvalidPairIndex {
                    text: s.after().chars().take(16).collect(),
                });
            }
            break;
        }
        let value = token.parse().map_err(|_| ParseError::InvalidPairIndex {
            text: token.to_string(),
        })?;
        values.push(value);
    }

    if values.len() % 2 != 0 {
        return Err(ParseError::UnbalancedPairs);
    }

    let mut pairs: Vec<(usize, usize)> = values.chunks_exact(2).map(|c| (c[0], c[1])).collect();
    pairs.sort_by_key(|p| p.0);
    Ok(pairs)
}
