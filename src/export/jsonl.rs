//! JSON-lines encoding.

use std::io::{self, Write};

use serde_json::Value;

/// Writes one compact JSON document per line.
pub(crate) fn write_jsonl<W: Write>(writer: &mut W, records: &[Value]) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writeln!(writer)?;
    }
    Ok(())
}
