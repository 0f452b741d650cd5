use super::venue::{QueryRows, VenueStore};
use tracing::debug;

pub const NO_RESULTS: &str = "No results found.";

/// Size limits applied when rendering rows for the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLimits {
    pub max_items: usize,
    pub max_chars: usize,
}

impl Default for FormatLimits {
    fn default() -> Self {
        Self {
            max_items: 5,
            max_chars: 500,
        }
    }
}

impl FormatLimits {
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

fn table_line<S: AsRef<str>>(cells: &[S]) -> String {
    let cells: Vec<&str> = cells.iter().map(AsRef::as_ref).collect();
    format!("| {} |", cells.join(" | "))
}

/// Render rows as a markdown-like table.
///
/// Every emitted line, header and separator included, counts its length in
/// characters plus one newline against `max_chars`. The first row that
/// would exceed either limit is replaced with a count of the rows left out.
pub fn format_table(rows: &QueryRows, limits: FormatLimits) -> String {
    if rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut lines = Vec::new();
    let mut chars = 0;

    let header = table_line(&rows.columns);
    chars += header.chars().count() + 1;
    lines.push(header);

    let separator = table_line(&vec!["---"; rows.columns.len()]);
    chars += separator.chars().count() + 1;
    lines.push(separator);

    for (idx, row) in rows.rows.iter().enumerate() {
        let line = table_line(row);
        chars += line.chars().count() + 1;
        if chars <= limits.max_chars && idx < limits.max_items {
            lines.push(line);
        } else {
            lines.push(format!("\n{} more records ...", rows.len() - idx));
            break;
        }
    }

    lines.join("\n")
}

/// Run agent-written SQL against one venue table.
///
/// Every failure is reported as result text so the agent can issue a new
/// call.
pub fn run_sql_query(venues: &VenueStore, table: &str, sql: &str, limits: FormatLimits) -> String {
    if !sql.contains(table) {
        return format!("Please query the {} table in the database.", table);
    }

    match venues.run_sql(sql) {
        Ok(rows) => format_table(&rows, limits),
        Err(err) => {
            debug!(target: "tod_bench::query", table, error = %err, "agent sql failed");
            err.to_string()
        }
    }
}

/// Select the declared result columns of `table` using equality filters
pub fn run_filter_query(
    venues: &VenueStore,
    table: &str,
    columns: &[String],
    filters: &[(String, String)],
    limits: FormatLimits,
) -> String {
    match venues.select(table, columns, filters) {
        Ok(rows) => format_table(&rows, limits),
        Err(err) => {
            debug!(target: "tod_bench::query", table, error = %err, "filter query failed");
            format!("SQL failed: {}", err)
        }
    }
}
