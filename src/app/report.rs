//! User-facing output for the binary.

use std::io::{self, Write};

use colored::*;

use super::Outcome;

/// Writes an outcome to stdout.
///
/// In-memory records go out as JSON lines so the output can be piped. When
/// records were exported, only a one-line summary is printed.
pub fn print_outcome(outcome: &Outcome) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_outcome(&mut out, outcome)?;
    out.flush()
}

pub(crate) fn write_outcome<W: Write>(out: &mut W, outcome: &Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Count(n) => writeln!(out, "{}", n),
        Outcome::Records(retrieval) => match &retrieval.exported_to {
            Some(path) => writeln!(
                out,
                "{} Saved {} record{} to {} ({})",
                "✓".green(),
                retrieval.stats.written,
                if retrieval.stats.written == 1 { "" } else { "s" },
                path.display(),
                retrieval.stats
            ),
            None => {
                for record in &retrieval.records {
                    serde_json::to_writer(&mut *out, record)?;
                    out.write_all(b"\n")?;
                }
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Retrieval;
    use crate::error_handling::RetrievalStats;
    use serde_json::json;
    use std::path::PathBuf;

    fn render(outcome: &Outcome) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        write_outcome(&mut buf, outcome).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_count_prints_number() {
        assert_eq!(render(&Outcome::Count(42)), "42\n");
    }

    #[test]
    fn test_records_print_as_json_lines() {
        let outcome = Outcome::Records(Retrieval {
            records: vec![json!({"pk": "a", "n": 1}), json!("x")],
            ..Default::default()
        });
        assert_eq!(render(&outcome), "{\"pk\":\"a\",\"n\":1}\n\"x\"\n");
    }

    #[test]
    fn test_export_prints_summary_only() {
        let outcome = Outcome::Records(Retrieval {
            records: Vec::new(),
            stats: RetrievalStats {
                requests: 1,
                observed: 3,
                kept: 1,
                flushes: 1,
                written: 1,
            },
            total: None,
            exported_to: Some(PathBuf::from("/tmp/out.json")),
        });
        let text = render(&outcome);
        assert!(text.contains("Saved 1 record to /tmp/out.json"), "got: {text}");
        assert_eq!(text.lines().count(), 1);
    }
}
