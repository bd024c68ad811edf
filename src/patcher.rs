//! Date-column cast rewrite
//!
//! Tables loaded through pandas often store dates as text, so `EXTRACT(YEAR
//! FROM "col")` fails on them. When generated SQL mentions a date function,
//! every quoted reference to an indexed date-like column is wrapped in
//! `TO_DATE(..., 'YYYY-MM-DD')`.
//!
//! This is a textual rewrite, not a parse: it applies to every indexed column
//! name whichever table the query reads, and it can touch string literals
//! that happen to contain a quoted column name.

use crate::schema::DateColumnIndex;

pub const DATE_FORMAT: &str = "YYYY-MM-DD";

const CAST_PREFIX: &str = "TO_DATE(";

/// Case-insensitive check for `EXTRACT` or `YEAR` anywhere in the text
pub fn mentions_date_function(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    upper.contains("EXTRACT") || upper.contains("YEAR")
}

/// Rewrite quoted date-like columns into casts. SQL that does not mention a
/// date function is returned unchanged.
pub fn patch_date_columns(sql: &str, index: &DateColumnIndex) -> String {
    if !mentions_date_function(sql) {
        return sql.to_string();
    }

    index
        .distinct_columns()
        .into_iter()
        .fold(sql.to_string(), |patched, column| cast_column(&patched, column))
}

/// Wrap each `"column"` (or `qualifier."column"`) occurrence, skipping those
/// that are already the first argument of `TO_DATE(`.
fn cast_column(sql: &str, column: &str) -> String {
    let quoted = format!("\"{}\"", column);
    let mut out = String::with_capacity(sql.len() + 32);
    let mut last = 0;

    for (pos, _) in sql.match_indices(&quoted) {
        let start = qualifier_start(&sql[..pos]).filter(|s| *s >= last).unwrap_or(pos);
        let end = pos + quoted.len();

        out.push_str(&sql[last..start]);
        if is_cast_argument(&sql[..start]) {
            out.push_str(&sql[start..end]);
        } else {
            out.push_str(&format!("{}{}, '{}')", CAST_PREFIX, &sql[start..end], DATE_FORMAT));
        }
        last = end;
    }

    out.push_str(&sql[last..]);
    out
}

/// Start of the qualifier chain (`"schema"."table".`, `alias.`, ...) that
/// ends right where `prefix` ends
fn qualifier_start(prefix: &str) -> Option<usize> {
    let mut start = None;
    while let Some(segment) = segment_start(&prefix[..start.unwrap_or(prefix.len())]) {
        start = Some(segment);
    }
    start
}

/// Start of a single `"ident".` or `ident.` segment at the end of `prefix`
fn segment_start(prefix: &str) -> Option<usize> {
    let before_dot = prefix.strip_suffix('.')?;

    if let Some(inner) = before_dot.strip_suffix('"') {
        return inner.rfind('"');
    }

    let ident_len: usize = before_dot
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    if ident_len == 0 {
        None
    } else {
        Some(before_dot.len() - ident_len)
    }
}

fn is_cast_argument(prefix: &str) -> bool {
    let trimmed = prefix.trim_end();
    trimmed.len() >= CAST_PREFIX.len()
        && trimmed
            .get(trimmed.len() - CAST_PREFIX.len()..)
            .map_or(false, |tail| tail.eq_ignore_ascii_case(CAST_PREFIX))
}
