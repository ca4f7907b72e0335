//! Coordinate string parsing: `"(x,y,z)"` → `Coord`.

use crate::core::{NeurographError, Result};
use crate::graph::schema::Coord;

/// Parse a coordinate cell of the form `(x,y,z)`.
///
/// Enclosing parentheses are optional. Each component must be a finite
/// floating-point number and there must be exactly three of them.
pub fn parse_coord(value: &str) -> Result<Coord> {
    let malformed = |reason: String| NeurographError::MalformedCoordinate {
        value: value.to_string(),
        reason,
    };

    let inner = value
        .trim()
        .trim_matches(|c: char| c == '(' || c == ')');
    let parts: Vec<&str> = inner.split(',').collect();
    if parts.len() != 3 {
        return Err(malformed(format!("expected 3 components, found {}", parts.len())));
    }

    let mut out = [0.0f64; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        let part = part.trim();
        let v: f64 = part
            .parse()
            .map_err(|_| malformed(format!("'{}' is not a number", part)))?;
        if !v.is_finite() {
            return Err(malformed(format!("'{}' is not finite", part)));
        }
        *slot = v;
    }

    Ok(Coord::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coord_basic() {
        let c = parse_coord("(10,20,30)").unwrap();
        assert_eq!(c, Coord::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn test_parse_coord_whitespace_and_no_parens() {
        let c = parse_coord("  36591.30859, 99053.46094 ,500 ").unwrap();
        assert_eq!(c, Coord::new(36591.30859, 99053.46094, 500.0));
    }

    #[test]
    fn test_parse_coord_wrong_count() {
        let err = parse_coord("(1,2)").unwrap_err();
        assert!(matches!(err, NeurographError::MalformedCoordinate { .. }));
        assert!(parse_coord("(1,2,3,4)").is_err());
    }

    #[test]
    fn test_parse_coord_non_numeric() {
        let err = parse_coord("(1,b,3)").unwrap_err();
        assert!(err.to_string().contains("'b' is not a number"));
        assert!(parse_coord("(1,,3)").is_err());
    }

    #[test]
    fn test_parse_coord_rejects_non_finite() {
        assert!(parse_coord("(nan,1,2)").is_err());
        assert!(parse_coord("(1,inf,2)").is_err());
    }
}
