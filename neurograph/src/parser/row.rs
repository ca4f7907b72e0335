//! Row → record parsing for edge and node tables.
//!
//! Edge rows: `[pre, post, "(x,y,z)", token...]`
//! Node rows: `[id, token...]`
//!
//! A token containing exactly one `:` is a `key:value` attribute; any other
//! non-empty token is a tag. Edge cells from the coordinate onward are
//! lower-cased before they are classified; node cells keep their case.

use std::collections::BTreeMap;

use crate::core::{NeurographError, Result};
use crate::graph::schema::{
    CellType, Coord, Synapse, CELL_TYPE_KEY, COORD_KEY, SOMA_COORD_KEY, TAGS_KEY,
};

use super::coord::parse_coord;

/// A parsed edge row. Confirmation is decided later by the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub pre: String,
    pub post: String,
    pub synapse: Synapse,
}

impl EdgeRecord {
    pub fn row(&self) -> Option<usize> {
        self.synapse.row
    }
}

/// A parsed node row.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub row: usize,
    pub cell_type: Option<CellType>,
    pub soma_coord: Option<Coord>,
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

/// One classified cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Attribute(&'a str, &'a str),
    Tag(&'a str),
}

/// Classify a single (already normalised) cell. Empty cells yield `None`.
pub fn classify_token(cell: &str) -> Option<Token<'_>> {
    if cell.is_empty() {
        return None;
    }
    if cell.matches(':').count() == 1 {
        if let Some((key, value)) = cell.split_once(':') {
            return Some(Token::Attribute(key.trim(), value.trim()));
        }
    }
    Some(Token::Tag(cell))
}

/// True if every cell in the row is blank.
pub fn is_blank_row<S: AsRef<str>>(row: &[S]) -> bool {
    row.iter().all(|c| c.as_ref().trim().is_empty())
}

/// Parse one edge row. `row_number` is 1-based and only used for reporting.
pub fn parse_edge_row<S: AsRef<str>>(row: &[S], row_number: usize) -> Result<EdgeRecord> {
    if row.len() < 3 {
        return Err(NeurographError::MalformedRow {
            row: row_number,
            reason: format!("edge rows need pre, post and coordinate cells, found {}", row.len()),
        });
    }

    let pre = row[0].as_ref().trim();
    let post = row[1].as_ref().trim();
    if pre.is_empty() || post.is_empty() {
        return Err(NeurographError::MalformedRow {
            row: row_number,
            reason: "edge row is missing a pre- or postsynaptic id".to_string(),
        });
    }

    let coord_cell = row[2].as_ref().trim().to_lowercase();
    let mut synapse = if coord_cell.is_empty() {
        Synapse::without_coord()
    } else {
        Synapse::new(parse_coord(&coord_cell)?)
    };
    synapse.row = Some(row_number);

    for cell in &row[3..] {
        let cell = cell.as_ref().trim().to_lowercase();
        match classify_token(&cell) {
            None => continue,
            Some(Token::Attribute(key, value)) => {
                if key == COORD_KEY || key == TAGS_KEY || synapse.attributes.contains_key(key) {
                    return Err(NeurographError::DuplicateAttributeKey {
                        key: key.to_string(),
                        row: Some(row_number),
                    });
                }
                synapse.attributes.insert(key.to_string(), value.to_string());
            }
            Some(Token::Tag(tag)) => {
                synapse.add_tag(tag);
            }
        }
    }

    Ok(EdgeRecord {
        pre: pre.to_string(),
        post: post.to_string(),
        synapse,
    })
}

/// Parse one node row. `row_number` is 1-based.
///
/// `cell_type` and `soma_coord` attributes are lifted into typed fields.
pub fn parse_node_row<S: AsRef<str>>(row: &[S], row_number: usize) -> Result<NodeRecord> {
    let id = row.first().map(|c| c.as_ref().trim()).unwrap_or("");
    if id.is_empty() {
        return Err(NeurographError::MalformedRow {
            row: row_number,
            reason: "node row has no id".to_string(),
        });
    }

    let mut record = NodeRecord {
        id: id.to_string(),
        row: row_number,
        cell_type: None,
        soma_coord: None,
        tags: Vec::new(),
        attributes: BTreeMap::new(),
    };

    for cell in &row[1..] {
        let cell = cell.as_ref().trim();
        match classify_token(cell) {
            None => continue,
            Some(Token::Attribute(key, value)) => {
                let seen = match key {
                    CELL_TYPE_KEY => record.cell_type.is_some(),
                    SOMA_COORD_KEY => record.soma_coord.is_some(),
                    TAGS_KEY => true,
                    _ => record.attributes.contains_key(key),
                };
                if seen {
                    return Err(NeurographError::DuplicateAttributeKey {
                        key: key.to_string(),
                        row: Some(row_number),
                    });
                }
                match key {
                    CELL_TYPE_KEY if value.is_empty() => {
                        // An empty label counts as missing and is left to the validator.
                        tracing::debug!("Node {} row {} has an empty cell_type", record.id, row_number);
                    }
                    CELL_TYPE_KEY => {
                        let cell_type = value.parse::<CellType>().map_err(|_| {
                            NeurographError::UnknownCellType {
                                node: record.id.clone(),
                                value: value.to_string(),
                            }
                        })?;
                        record.cell_type = Some(cell_type);
                    }
                    SOMA_COORD_KEY => record.soma_coord = Some(parse_coord(value)?),
                    _ => {
                        record.attributes.insert(key.to_string(), value.to_string());
                    }
                }
            }
            Some(Token::Tag(tag)) => {
                if !record.tags.iter().any(|t| t == tag) {
                    record.tags.push(tag.to_string());
                }
            }
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_token() {
        assert_eq!(classify_token(""), None);
        assert_eq!(classify_token("weight:2"), Some(Token::Attribute("weight", "2")));
        assert_eq!(classify_token("confirmed"), Some(Token::Tag("confirmed")));
        // Two colons is not a key:value pair.
        assert_eq!(classify_token("a:b:c"), Some(Token::Tag("a:b:c")));
    }

    #[test]
    fn test_parse_edge_row_scenario() {
        let rec = parse_edge_row(&["cf_1", "mli2_5", "(10,20,30)", "confirmed"], 1).unwrap();
        assert_eq!(rec.pre, "cf_1");
        assert_eq!(rec.post, "mli2_5");
        assert_eq!(rec.synapse.coord, Some(Coord::new(10.0, 20.0, 30.0)));
        assert_eq!(rec.synapse.tags, vec!["confirmed".to_string()]);
        assert_eq!(rec.row(), Some(1));
    }

    #[test]
    fn test_parse_edge_row_lowercases_tokens_not_ids() {
        let rec =
            parse_edge_row(&["CF_1", "PC_2", "(1,2,3)", "Confirmed", "Size:Large", ""], 4).unwrap();
        assert_eq!(rec.pre, "CF_1");
        assert_eq!(rec.synapse.tags, vec!["confirmed".to_string()]);
        assert_eq!(rec.synapse.attributes.get("size").map(String::as_str), Some("large"));
    }

    #[test]
    fn test_parse_edge_row_duplicate_attribute() {
        let err = parse_edge_row(&["a", "b", "(1,2,3)", "w:1", "W:2"], 7).unwrap_err();
        match err {
            NeurographError::DuplicateAttributeKey { key, row } => {
                assert_eq!(key, "w");
                assert_eq!(row, Some(7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_edge_row_reserved_keys() {
        assert!(parse_edge_row(&["a", "b", "(1,2,3)", "coord:5"], 1).is_err());
        assert!(parse_edge_row(&["a", "b", "(1,2,3)", "tags:x"], 1).is_err());
    }

    #[test]
    fn test_parse_edge_row_empty_coord_is_missing() {
        let rec = parse_edge_row(&["a", "b", "", "confirmed"], 2).unwrap();
        assert!(rec.synapse.coord.is_none());
    }

    #[test]
    fn test_parse_edge_row_short() {
        let err = parse_edge_row(&["a", "b"], 3).unwrap_err();
        assert!(matches!(err, NeurographError::MalformedRow { row: 3, .. }));
    }

    #[test]
    fn test_parse_node_row_scenario() {
        let rec = parse_node_row(&["n1", "cell_type:MLI1", "red"], 1).unwrap();
        assert_eq!(rec.id, "n1");
        assert_eq!(rec.cell_type, Some(CellType::Mli1));
        assert_eq!(rec.tags, vec!["red".to_string()]);
        assert!(rec.attributes.is_empty());
    }

    #[test]
    fn test_parse_node_row_soma_and_attributes() {
        let rec = parse_node_row(&[" mli1_4 ", "soma_coord:(1,2,3)", "layer:ML", "Red"], 9).unwrap();
        assert_eq!(rec.id, "mli1_4");
        assert_eq!(rec.soma_coord, Some(Coord::new(1.0, 2.0, 3.0)));
        assert_eq!(rec.attributes.get("layer").map(String::as_str), Some("ML"));
        assert_eq!(rec.tags, vec!["Red".to_string()]);
    }

    #[test]
    fn test_parse_node_row_unknown_cell_type() {
        let err = parse_node_row(&["x", "cell_type:golgi"], 1).unwrap_err();
        assert!(matches!(err, NeurographError::UnknownCellType { .. }));
    }

    #[test]
    fn test_parse_node_row_empty_cell_type_is_missing() {
        let rec = parse_node_row(&["x", "cell_type:", "red"], 4).unwrap();
        assert_eq!(rec.cell_type, None);
        assert_eq!(rec.tags, vec!["red".to_string()]);
        assert_eq!(parse_node_row(&["x", "cell_type: "], 4).unwrap().cell_type, None);
    }

    #[test]
    fn test_blank_rows() {
        assert!(is_blank_row(&["", " ", ""]));
        assert!(is_blank_row::<&str>(&[]));
        assert!(!is_blank_row(&["", "x"]));
    }
}
