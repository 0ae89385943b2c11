//! JSON formatter for analysis results.

use super::Formatter;
use crate::cli::analysis::Analysis;
use lockscan_core::DuplicateSummary;
use serde_json::{json, Value};
use std::io::{self, Write};

pub struct JsonFormatter;

fn header(analysis: &Analysis) -> Value {
    let root = analysis.tree.root();
    json!({
        "lockfile": analysis.lockfile.path,
        "format": analysis.lockfile.format(),
        "root": { "name": root.name, "version": root.version },
    })
}

fn write_document(out: &mut dyn Write, mut document: Value, key: &str, body: Value) -> io::Result<()> {
    if let Some(obj) = document.as_object_mut() {
        obj.insert(key.to_string(), body);
    }
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

impl Formatter for JsonFormatter {
    fn write_duplicates(
        &self,
        analysis: &Analysis,
        summary: &DuplicateSummary,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        let body = serde_json::to_value(summary)?;
        let mut document = header(analysis);
        if let Some(obj) = document.as_object_mut() {
            obj.insert(
                "unresolved".to_string(),
                serde_json::to_value(analysis.tree.unresolved())?,
            );
        }
        write_document(out, document, "duplicates", body)
    }

    fn write_tree(&self, analysis: &Analysis, out: &mut dyn Write) -> io::Result<()> {
        let body = serde_json::to_value(&analysis.tree)?;
        write_document(out, header(analysis), "tree", body)
    }
}
