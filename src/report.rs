use crate::snapshot::Snapshot;
use comfy_table::{Attribute, Cell, CellAlignment, Table};

#[must_use]
pub fn snapshot_table(snapshot: &Snapshot) -> Table {
    let mut rows: Vec<_> = snapshot.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(vec!["Path", "Size", "Modified"]);

    let mut total: u64 = 0;
    for (path, entry) in &rows {
        total = total.saturating_add(entry.size);
        table.add_row(vec![
            Cell::new(path),
            Cell::new(human_bytes::human_bytes(entry.size as f64))
                .set_alignment(CellAlignment::Right),
            Cell::new(entry.modified.format("%Y-%m-%d %H:%M:%S %:z")),
        ]);
    }

    table.add_row(vec![
        Cell::new(format!("TOTAL ({} files)", rows.len())).add_attribute(Attribute::Bold),
        Cell::new(human_bytes::human_bytes(total as f64))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    table
}

pub fn print_snapshot(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        println!("No tracked files.");
        return;
    }
    println!("{}", snapshot_table(snapshot));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileEntry;
    use chrono::DateTime;

    #[test]
    fn test_snapshot_table_rows() {
        let mut s = Snapshot::new();
        for (path, size) in [("/b.mxf", 2048_u64), ("/a.mxf", 1024)] {
            s.insert(
                path,
                FileEntry {
                    name: path.trim_start_matches('/').to_string(),
                    size,
                    modified: DateTime::parse_from_rfc3339("2017-03-17T14:39:39+03:00").unwrap(),
                    found: false,
                },
            );
        }

        let rendered = snapshot_table(&s).to_string();
        let a = rendered.find("/a.mxf").unwrap();
        let b = rendered.find("/b.mxf").unwrap();
        assert!(a < b);
        assert!(rendered.contains("2017-03-17 14:39:39 +03:00"));
        assert!(rendered.contains("TOTAL (2 files)"));
    }
}
