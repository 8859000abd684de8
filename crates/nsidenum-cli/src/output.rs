//! Rendering of enumeration results on stdout.

use nsidenum_core::Results;
use std::io::{self, Write};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Numbered list followed by statistics.
    Numbered,
    /// Identifiers only, one per line.
    Quiet,
    /// Pretty-printed JSON document.
    Json,
}

/// Writes the results in the given mode.
pub fn write_results<W: Write>(results: &Results, mode: OutputMode, out: &mut W) -> io::Result<()> {
    match mode {
        OutputMode::Quiet => {
            for id in &results.identifiers {
                writeln!(out, "{}", id)?;
            }
        }
        OutputMode::Json => {
            let json = results
                .to_json()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            writeln!(out, "{}", json)?;
        }
        OutputMode::Numbered => write_numbered(results, out)?,
    }
    out.flush()
}

fn write_numbered<W: Write>(results: &Results, out: &mut W) -> io::Result<()> {
    let count = results.identifiers.len();
    let hint = if count == 0 {
        " (target not supporting NSID?)"
    } else {
        ""
    };
    writeln!(
        out,
        "Found {} server{}{}",
        count,
        if count == 1 { "" } else { "s" },
        hint
    )?;
    for (i, id) in results.identifiers.iter().enumerate() {
        writeln!(out, "{}) {}", i + 1, id)?;
    }

    let stats = &results.stats;
    writeln!(out)?;
    writeln!(out, "Statistics:")?;
    writeln!(out, "  Total DNS queries      : {}", stats.total)?;
    writeln!(out, "  Answered               : {}", stats.answered)?;
    writeln!(out, "  Timeouts               : {}", stats.timeouts)?;
    writeln!(out, "  Transport failures     : {}", stats.transport_failures)?;
    writeln!(out, "  Malformed NSIDs        : {}", stats.malformed)?;
    writeln!(
        out,
        "  Percent failed queries : {:.2}",
        stats.failure_percentage()
    )?;
    Ok(())
}
