//! Table parsing: rows of string cells into edge, node and soma records.

pub mod coord;
pub mod row;
pub mod soma;

pub use coord::parse_coord;
pub use row::{
    classify_token, is_blank_row, parse_edge_row, parse_node_row, EdgeRecord, NodeRecord, Token,
};
pub use soma::{apply_soma_table, parse_soma_row, SomaRecord};

/// One table row as read from a spreadsheet export.
pub type Row = Vec<String>;

/// A whole table, header-less.
pub type Table = Vec<Row>;

/// Copy a table with every cell trimmed of surrounding whitespace.
pub fn trim_table<R: AsRef<str>>(table: &[Vec<R>]) -> Table {
    table
        .iter()
        .map(|row| row.iter().map(|c| c.as_ref().trim().to_string()).collect())
        .collect()
}
