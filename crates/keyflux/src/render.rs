use std::fmt::Write;

use keyflux_core::{FilteredView, KeyRecord, KeyTree, TTL_MISSING, TTL_NO_EXPIRY};

pub fn format_ttl(ttl_seconds: i64) -> String {
    match ttl_seconds {
        TTL_NO_EXPIRY => "no expiry".to_string(),
        TTL_MISSING => "missing".to_string(),
        secs => format!("{}s", secs),
    }
}

fn record_suffix(record: &KeyRecord) -> String {
    format!("[{}] {}", record.key_type, format_ttl(record.ttl_seconds))
}

pub fn render_list(view: &FilteredView) -> String {
    let width = view.iter().map(|record| record.key.len()).max().unwrap_or(0);
    let mut out = String::new();

    for record in view.iter() {
        let _ = writeln!(out, "{:width$}  {}", record.key, record_suffix(record));
    }

    out
}

/// Indented outline of the tree. Folders show their key count; a node that
/// is both a folder and a key shows both.
pub fn render_tree(tree: &KeyTree) -> String {
    let mut out = String::new();

    tree.walk(|node, depth| {
        let indent = "  ".repeat(depth);
        let _ = match (node.is_folder(), node.record.as_ref()) {
            (true, Some(record)) => writeln!(
                out,
                "{}{}/ ({})  {}",
                indent,
                node.name,
                node.leaf_count(),
                record_suffix(record)
            ),
            (true, None) => writeln!(out, "{}{}/ ({})", indent, node.name, node.leaf_count()),
            (false, Some(record)) => {
                writeln!(out, "{}{}  {}", indent, node.name, record_suffix(record))
            }
            (false, None) => writeln!(out, "{}{}", indent, node.name),
        };
    });

    out
}
