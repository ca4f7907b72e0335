//! Soma location import.
//!
//! Rows are either `[id, "x,y,z"]` or `[id, x, y, z]`.

use crate::core::{NeurographError, Result};
use crate::graph::schema::Coord;
use crate::graph::ConnectomeGraph;

use super::coord::parse_coord;
use super::row::is_blank_row;

#[derive(Debug, Clone, PartialEq)]
pub struct SomaRecord {
    pub id: String,
    pub coord: Coord,
}

pub fn parse_soma_row<S: AsRef<str>>(row: &[S], row_number: usize) -> Result<SomaRecord> {
    let cells: Vec<&str> = row.iter().map(|c| c.as_ref().trim()).collect();
    let malformed = |reason: &str| NeurographError::MalformedRow {
        row: row_number,
        reason: reason.to_string(),
    };

    let id = cells.first().copied().unwrap_or("");
    if id.is_empty() {
        return Err(malformed("soma row has no id"));
    }

    let coord = match cells.get(1) {
        Some(cell) if cell.contains(',') => parse_coord(cell)?,
        Some(_) => {
            let parts: Vec<&str> = cells[1..]
                .iter()
                .copied()
                .filter(|c| !c.is_empty())
                .collect();
            parse_coord(&parts.join(","))?
        }
        None => return Err(malformed("soma row has no coordinate")),
    };

    Ok(SomaRecord {
        id: id.to_string(),
        coord,
    })
}

/// Set `soma_coord` on every neuron named in the table.
///
/// All rows are parsed and checked before the graph is touched, so an error
/// leaves the graph unchanged. Returns the number of neurons updated.
pub fn apply_soma_table<R: AsRef<str>>(graph: &mut ConnectomeGraph, table: &[Vec<R>]) -> Result<usize> {
    let mut records = Vec::new();
    for (i, row) in table.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }
        let record = parse_soma_row(row, i + 1)?;
        if !graph.contains(&record.id) {
            return Err(NeurographError::UnknownNode(record.id));
        }
        records.push(record);
    }

    for record in &records {
        graph.set_soma(&record.id, record.coord)?;
    }
    tracing::debug!("Applied {} soma locations", records.len());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::Neuron;

    #[test]
    fn test_parse_soma_row_both_shapes() {
        let a = parse_soma_row(&["mli1_1", "(1,2,3)"], 1).unwrap();
        let b = parse_soma_row(&["mli1_1", "1", "2", "3"], 2).unwrap();
        assert_eq!(a.coord, b.coord);
        assert_eq!(a.coord, Coord::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_parse_soma_row_errors() {
        assert!(parse_soma_row(&["mli1_1"], 1).is_err());
        assert!(parse_soma_row(&["", "1,2,3"], 1).is_err());
        assert!(parse_soma_row(&["mli1_1", "1", "2"], 1).is_err());
    }

    #[test]
    fn test_apply_soma_table() {
        let mut graph = ConnectomeGraph::new();
        graph.ensure_neuron("mli1_1");
        graph.merge_node(Neuron::new("mli1_2"));

        let n = apply_soma_table(&mut graph, &[vec!["mli1_1", "4,5,6"], vec!["", ""]]).unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            graph.neuron("mli1_1").unwrap().soma_coord,
            Some(Coord::new(4.0, 5.0, 6.0))
        );

        let err = apply_soma_table(&mut graph, &[vec!["mli1_2", "1,1,1"], vec!["ghost", "1,1,1"]])
            .unwrap_err();
        assert!(matches!(err, NeurographError::UnknownNode(ref id) if id == "ghost"));
        assert!(graph.neuron("mli1_2").unwrap().soma_coord.is_none());
    }
}
