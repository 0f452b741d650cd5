use crate::error::Result;
use rusqlite::{
    ffi, params_from_iter, types::ValueRef, Connection, OpenFlags, OptionalExtension,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Rows returned by a venue lookup, with every cell rendered as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// A venue resolved by name or address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueMatch {
    pub domain: String,
    pub name: String,
    pub address: String,
}

/// Read-only catalogue of venues and trains.
///
/// The connection is switched to `query_only`, and agent-written SQL is
/// refused unless SQLite reports the statement as read-only, so a pragma
/// cannot lift the restriction.
#[derive(Debug)]
pub struct VenueStore {
    conn: Mutex<Connection>,
}

impl VenueStore {
    /// Open an existing SQLite database read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn)
    }

    /// Wrap an already populated connection
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "query_only", true)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // a poisoned lock only means another dialogue panicked mid-read
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a statement written by the agent.
    ///
    /// Anything but a read-only statement fails with `SQLITE_READONLY`
    /// before it is stepped.
    pub fn run_sql(&self, sql: &str) -> rusqlite::Result<QueryRows> {
        debug!(target: "tod_bench::venue", sql, "running agent sql");
        let conn = self.lock();
        let mut statement = conn.prepare(sql)?;
        if !statement.readonly() {
            return Err(rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_READONLY),
                Some("attempt to write a readonly database".to_string()),
            ));
        }
        collect_rows(&mut statement, Vec::<String>::new())
    }

    /// Select `columns` from `table` where every filter matches exactly
    pub fn select(
        &self,
        table: &str,
        columns: &[String],
        filters: &[(String, String)],
    ) -> rusqlite::Result<QueryRows> {
        let fields = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", fields, quote_identifier(table));
        if !filters.is_empty() {
            let conditions = filters
                .iter()
                .enumerate()
                .map(|(idx, (column, _))| format!("{} = ?{}", quote_identifier(column), idx + 1))
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        debug!(target: "tod_bench::venue", %sql, "running filter query");
        let conn = self.lock();
        let mut statement = conn.prepare(&sql)?;
        collect_rows(&mut statement, filters.iter().map(|(_, value)| value.clone()))
    }

    /// Whether any row of `table` has `column` equal to `value`
    pub fn exists(&self, table: &str, column: &str, value: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            quote_identifier(table),
            quote_identifier(column)
        );
        let conn = self.lock();
        let found = conn
            .query_row(&sql, [value], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(found)
    }

    /// First venue of `domain` whose name equals `name` or whose address
    /// equals `address`
    pub fn find_by_name_or_address(
        &self,
        domain: &str,
        name: &str,
        address: &str,
    ) -> Result<Option<VenueMatch>> {
        let sql = format!(
            "SELECT name, address FROM {} WHERE name = ?1 OR address = ?2 LIMIT 1",
            quote_identifier(domain)
        );
        let conn = self.lock();
        let venue = conn
            .query_row(&sql, [name, address], |row| {
                Ok(VenueMatch {
                    domain: domain.to_string(),
                    name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    address: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })
            .optional()?;
        Ok(venue)
    }

    /// Non-null values of one column, used for slot type inference.
    ///
    /// A missing table or column yields no samples rather than an error.
    pub fn column_samples(&self, table: &str, column: &str) -> Result<Vec<String>> {
        if !self.has_column(table, column)? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT {} FROM {} WHERE {} IS NOT NULL",
            quote_identifier(column),
            quote_identifier(table),
            quote_identifier(column)
        );
        let conn = self.lock();
        let mut statement = conn.prepare(&sql)?;
        let rows = collect_rows(&mut statement, Vec::<String>::new())?;
        Ok(rows.rows.into_iter().filter_map(|mut row| row.pop()).collect())
    }

    pub fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let conn = self.lock();
        let mut statement =
            conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names.iter().any(|name| name == column))
    }

    /// The table's CREATE statement followed by a few sample rows, shown
    /// to the agent so it can write SQL against the table
    pub fn table_info(&self, table: &str, sample_rows: usize) -> Result<String> {
        let create: Option<String> = {
            let conn = self.lock();
            conn.query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?
        };
        let Some(create) = create else {
            return Ok(String::new());
        };

        let sample_sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_identifier(table),
            sample_rows
        );
        let samples = {
            let conn = self.lock();
            let mut statement = conn.prepare(&sample_sql)?;
            collect_rows(&mut statement, Vec::<String>::new())?
        };

        let mut info = format!("{}\n\n/*\n{} rows from {} table:\n", create.trim(), sample_rows, table);
        info.push_str(&samples.columns.join("\t"));
        for row in &samples.rows {
            info.push('\n');
            info.push_str(&row.join("\t"));
        }
        info.push_str("\n*/");
        Ok(info)
    }
}

fn collect_rows<I>(statement: &mut rusqlite::Statement<'_>, params: I) -> rusqlite::Result<QueryRows>
where
    I: IntoIterator<Item = String>,
{
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = statement.query(params_from_iter(params))?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(render_cell(row.get_ref(idx)?));
        }
        rows.push(cells);
    }

    Ok(QueryRows { columns, rows })
}

fn render_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "None".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(text) | ValueRef::Blob(text) => String::from_utf8_lossy(text).into_owned(),
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small catalogue shared by the function-layer tests
    pub(crate) fn sample_store() -> VenueStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE restaurant (id INTEGER PRIMARY KEY, name TEXT, area TEXT,
                pricerange TEXT, food TEXT, phone TEXT, postcode TEXT, address TEXT);
            CREATE TABLE hotel (id INTEGER PRIMARY KEY, name TEXT, type TEXT, area TEXT,
                internet TEXT, parking TEXT, pricerange TEXT, stars TEXT, phone TEXT,
                address TEXT, postcode TEXT);
            CREATE TABLE attraction (id INTEGER PRIMARY KEY, name TEXT, type TEXT, area TEXT,
                phone TEXT, address TEXT, postcode TEXT, entrance_fee TEXT);
            CREATE TABLE train (id INTEGER PRIMARY KEY, trainID TEXT, departure TEXT,
                destination TEXT, day TEXT, leaveAt TEXT, arriveBy TEXT, price TEXT,
                duration TEXT);
            INSERT INTO restaurant (name, area, pricerange, food, phone, postcode, address) VALUES
                ('pizza hut', 'centre', 'cheap', 'italian', '01223323737', 'cb21ab', 'regent street city centre'),
                ('golden wok', 'north', 'moderate', 'chinese', '01223350688', 'cb43hl', '191 histon road chesterton'),
                ('rosa''s kitchen', 'west', 'cheap', 'spanish', '01223000000', 'cb30aa', '1 market hill');
            INSERT INTO hotel (name, type, area, internet, parking, pricerange, stars, phone, address, postcode) VALUES
                ('acorn guest house', 'guesthouse', 'north', 'yes', 'yes', 'moderate', '4', '01223353888', '154 chesterton road', 'cb41da'),
                ('rosa''s bed and breakfast', 'guesthouse', 'south', 'yes', 'yes', 'cheap', '4', '01223512596', '53 roseford road', 'cb22ha');
            INSERT INTO attraction (name, type, area, phone, address, postcode, entrance_fee) VALUES
                ('kings college', 'college', 'centre', '01223331100', 'king''s parade', 'cb21st', 'free'),
                ('the fitzwilliam museum', 'museum', 'centre', '01223332900', 'trumpington street', 'cb21rb', 'free');
            INSERT INTO train (trainID, departure, destination, day, leaveAt, arriveBy, price, duration) VALUES
                ('tr1234', 'cambridge', 'london kings cross', 'monday', '05:00', '05:51', '23.60 pounds', '51 minutes'),
                ('tr9876', 'london kings cross', 'cambridge', 'friday', '09:17', '10:08', '23.60 pounds', '51 minutes');
            "#,
        )
        .unwrap();
        VenueStore::from_connection(conn).unwrap()
    }

    #[test]
    fn test_select_with_filters() {
        let store = sample_store();
        let rows = store
            .select(
                "restaurant",
                &["name".to_string(), "food".to_string()],
                &[("area".to_string(), "north".to_string())],
            )
            .unwrap();
        assert_eq!(rows.columns, vec!["name", "food"]);
        assert_eq!(rows.rows, vec![vec!["golden wok".to_string(), "chinese".to_string()]]);
    }

    #[test]
    fn test_filters_are_case_sensitive() {
        let store = sample_store();
        let rows = store
            .select("restaurant", &[], &[("area".to_string(), "North".to_string())])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_pragma_cannot_unlock_writes() {
        let store = sample_store();
        let _ = store.run_sql("PRAGMA query_only = 0");
        let error = store.run_sql("DELETE FROM restaurant").unwrap_err();
        assert!(error.to_string().contains("readonly"));
        let _ = store.run_sql("DROP TABLE hotel");
        assert_eq!(store.run_sql("SELECT name FROM restaurant").unwrap().len(), 3);
        assert_eq!(store.run_sql("SELECT name FROM hotel").unwrap().len(), 2);
    }

    #[test]
    fn test_store_rejects_writes() {
        let store = sample_store();
        let result = store.run_sql("DELETE FROM restaurant");
        assert!(result.is_err());
        assert_eq!(store.run_sql("SELECT name FROM restaurant").unwrap().len(), 3);
    }

    #[test]
    fn test_exists_and_lookup() {
        let store = sample_store();
        assert!(store.exists("restaurant", "name", "pizza hut").unwrap());
        assert!(!store.exists("restaurant", "name", "Pizza Hut").unwrap());

        let by_address = store
            .find_by_name_or_address("attraction", "unused", "trumpington street")
            .unwrap()
            .unwrap();
        assert_eq!(by_address.name, "the fitzwilliam museum");
        assert!(store
            .find_by_name_or_address("hotel", "nowhere", "nowhere")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_column_samples_for_missing_column() {
        let store = sample_store();
        assert!(store.column_samples("hotel", "rating").unwrap().is_empty());
        let stars = store.column_samples("hotel", "stars").unwrap();
        assert_eq!(stars, vec!["4".to_string()]);
    }

    #[test]
    fn test_table_info_contains_schema_and_samples() {
        let store = sample_store();
        let info = store.table_info("train", 2).unwrap();
        assert!(info.starts_with("CREATE TABLE train"));
        assert!(info.contains("tr1234"));
        assert!(info.contains("2 rows from train table"));
    }
}
