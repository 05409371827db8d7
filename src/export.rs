use std::io::Write;

use serde::Serialize;

use crate::metrics::ScoredEntry;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Header row from the record's field names, then one row per record.
/// `None` fields are written as empty cells.
pub fn write_csv<T: Serialize, W: Write>(writer: W, records: &[T]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Pretty JSON with a trailing newline.
pub fn write_json<T: Serialize + ?Sized, W: Write>(
    mut writer: W,
    value: &T,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

pub fn fmt_num(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

const NAME_WIDTH: usize = 40;
const LANGUAGE_WIDTH: usize = 12;

/// Fixed-width listing for a terminal, one entry per line.
pub fn render_table(entries: &[ScoredEntry]) -> String {
    let mut out = format!(
        "{:>3}  {:<NAME_WIDTH$}  {:<LANGUAGE_WIDTH$}  {:>9}  {:>8}  {:>7}  {:>5}  {}\n",
        "#", "repository", "language", "stars", "forks", "today", "score", "activity"
    );
    for (i, scored) in entries.iter().enumerate() {
        let e = &scored.entry;
        out.push_str(&format!(
            "{:>3}  {:<NAME_WIDTH$}  {:<LANGUAGE_WIDTH$}  {:>9}  {:>8}  {:>7}  {:>5.1}  {}\n",
            i + 1,
            truncate(&e.name, NAME_WIDTH),
            truncate(&e.language, LANGUAGE_WIDTH),
            fmt_num(e.stars),
            fmt_num(e.forks),
            fmt_num(e.stars_today),
            scored.popularity_score,
            scored.activity_level,
        ));
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
