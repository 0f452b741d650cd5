use super::normalize::{clean_time, is_clock_time, is_positive_integer, is_weekday};
use super::venue::{quote_identifier, VenueStore};
use crate::error::{AgentError, Result};
use rand::Rng;
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

const REFERENCE_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const REFERENCE_LEN: usize = 8;
const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// Fixed booking domains with a persistent store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingDomain {
    Restaurant,
    Hotel,
    Train,
}

impl BookingDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingDomain::Restaurant => "restaurant",
            BookingDomain::Hotel => "hotel",
            BookingDomain::Train => "train",
        }
    }

    /// Required slots with the phrase used when asking for them
    pub fn required_slots(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            BookingDomain::Restaurant => &[
                ("name", "the restaurant name"),
                ("people", "the number of people"),
                ("day", "the booking day"),
                ("time", "the booking time"),
            ],
            BookingDomain::Hotel => &[
                ("name", "the hotel name"),
                ("people", "the number of people"),
                ("day", "the booking day"),
                ("stay", "the days to stay"),
            ],
            BookingDomain::Train => &[
                ("train_id", "the train id"),
                ("tickets", "the number of tickets"),
            ],
        }
    }

    /// Slot naming the booked entity
    pub fn entity_slot(&self) -> &'static str {
        match self {
            BookingDomain::Train => "train_id",
            _ => "name",
        }
    }

    /// What the entity is called in messages, and its placeholder token
    fn entity_label(&self) -> &'static str {
        match self {
            BookingDomain::Restaurant => "restaurant name",
            BookingDomain::Hotel => "hotel name",
            BookingDomain::Train => "train id",
        }
    }

    /// Venue table and column the entity must exist in
    fn venue_column(&self) -> (&'static str, &'static str) {
        match self {
            BookingDomain::Restaurant => ("restaurant", "name"),
            BookingDomain::Hotel => ("hotel", "name"),
            BookingDomain::Train => ("train", "trainID"),
        }
    }

    pub fn table_name(&self) -> String {
        format!("{}_book", self.as_str())
    }
}

impl FromStr for BookingDomain {
    type Err = AgentError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "restaurant" => Ok(BookingDomain::Restaurant),
            "hotel" => Ok(BookingDomain::Hotel),
            "train" => Ok(BookingDomain::Train),
            other => Err(AgentError::Config(format!(
                "\"{}\" is not a bookable domain",
                other
            ))),
        }
    }
}

/// Coarse class of a rejected booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// A slot is absent or still holds a template placeholder
    Missing,
    /// A slot value has the wrong format
    Format,
    /// The named venue, train or place is not in the catalogue
    Existence,
    /// Slots are individually valid but inconsistent with each other
    Relation,
}

/// Why a booking was not made. The `Display` text is sent back to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingRejection {
    #[error("Booking failed. Please provide {} for reservation.", .descriptions.join(", "))]
    MissingSlots { descriptions: Vec<String> },

    #[error("Booking failed. Please provide the {label} to book.")]
    PlaceholderEntity { label: String },

    #[error("Booking failed. Please provide the values for {}.", .slots.join(", "))]
    PlaceholderValues { slots: Vec<String> },

    #[error("Booking failed. The value of {slot} should be a positive integer.")]
    NotPositiveInteger { slot: String },

    #[error("Booking failed. The value of day should be a day in a week.")]
    InvalidDay,

    #[error("Booking failed. Please provide a valid time, like \"08:30\".")]
    InvalidTime,

    #[error("Booking failed. \"{value}\" is not found in the {domain} database. Please provide a valid {label}.")]
    UnknownEntity {
        value: String,
        domain: String,
        label: String,
    },

    #[error("Booking failed. The {} is missing.", .slots.join(" and "))]
    MissingPlaces { slots: Vec<String> },

    #[error("Booking failed. Please provide valid place for the {}.", .slots.join(" and "))]
    UnknownPlaces { slots: Vec<String> },

    #[error("Booking failed. The departure and destination can not be the same place.")]
    SamePlace,

    #[error("Booking failed. The leave time or arrive time is missing.")]
    MissingTravelTime,

    #[error("Booking failed. Please provide valid time format for the {}, like \"07:30\".", .slots.join(" and "))]
    InvalidTravelTime { slots: Vec<String> },
}

impl BookingRejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            BookingRejection::MissingSlots { .. }
            | BookingRejection::PlaceholderEntity { .. }
            | BookingRejection::PlaceholderValues { .. }
            | BookingRejection::MissingPlaces { .. }
            | BookingRejection::MissingTravelTime => RejectionKind::Missing,
            BookingRejection::NotPositiveInteger { .. }
            | BookingRejection::InvalidDay
            | BookingRejection::InvalidTime
            | BookingRejection::InvalidTravelTime { .. } => RejectionKind::Format,
            BookingRejection::UnknownEntity { .. } | BookingRejection::UnknownPlaces { .. } => {
                RejectionKind::Existence
            }
            BookingRejection::SamePlace => RejectionKind::Relation,
        }
    }
}

/// Placeholder tokens an agent leaves when it has not filled a slot
pub(crate) fn is_placeholder(value: &str) -> bool {
    matches!(
        value,
        "[value]" | "[restaurant name]" | "[hotel name]" | "[train id]"
    )
}

/// Run every check of a fixed-domain booking and return the slots to store.
///
/// Nothing is written here; [`BookingStore::commit`] is only reached with
/// the output of this function.
pub fn validate_booking(
    domain: BookingDomain,
    info: &BTreeMap<String, String>,
    venues: &VenueStore,
) -> Result<std::result::Result<BTreeMap<String, String>, BookingRejection>> {
    let mut info: BTreeMap<String, String> = info
        .iter()
        .map(|(k, v)| (k.clone(), v.trim().to_lowercase()))
        .collect();

    let missing: Vec<String> = domain
        .required_slots()
        .iter()
        .filter(|(slot, _)| info.get(*slot).map_or(true, |v| v.is_empty()))
        .map(|(_, description)| description.to_string())
        .collect();
    if !missing.is_empty() {
        return Ok(Err(BookingRejection::MissingSlots {
            descriptions: missing,
        }));
    }

    let entity_slot = domain.entity_slot();
    if is_placeholder(&info[entity_slot]) {
        return Ok(Err(BookingRejection::PlaceholderEntity {
            label: domain.entity_label().to_string(),
        }));
    }
    let placeholders: Vec<String> = domain
        .required_slots()
        .iter()
        .map(|(slot, _)| *slot)
        .filter(|slot| *slot != entity_slot && is_placeholder(&info[*slot]))
        .map(str::to_string)
        .collect();
    if !placeholders.is_empty() {
        return Ok(Err(BookingRejection::PlaceholderValues {
            slots: placeholders,
        }));
    }

    let counted = match domain {
        BookingDomain::Restaurant => vec!["people"],
        BookingDomain::Hotel => vec!["people", "stay"],
        BookingDomain::Train => vec!["tickets"],
    };
    for slot in counted {
        if !is_positive_integer(&info[slot]) {
            return Ok(Err(BookingRejection::NotPositiveInteger {
                slot: slot.to_string(),
            }));
        }
    }

    if domain != BookingDomain::Train && !is_weekday(&info["day"]) {
        return Ok(Err(BookingRejection::InvalidDay));
    }

    if domain == BookingDomain::Restaurant {
        let time = clean_time(&info["time"]);
        if !is_clock_time(&time) {
            return Ok(Err(BookingRejection::InvalidTime));
        }
        info.insert("time".to_string(), time);
    }

    let (table, column) = domain.venue_column();
    let entity = &info[entity_slot];
    if !venues.exists(table, column, entity)? {
        return Ok(Err(BookingRejection::UnknownEntity {
            value: entity.clone(),
            domain: domain.as_str().to_string(),
            label: domain.entity_label().to_string(),
        }));
    }

    // only the declared slots are stored
    let stored = domain
        .required_slots()
        .iter()
        .map(|(slot, _)| (slot.to_string(), info[*slot].clone()))
        .collect();
    Ok(Ok(stored))
}

/// An immutable committed booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub domain: String,
    pub reference_number: String,
    pub slots: BTreeMap<String, String>,
}

/// Generate an 8 character reference from lowercase letters and digits
pub fn generate_reference_number() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERENCE_LEN)
        .map(|_| REFERENCE_CHARSET[rng.gen_range(0..REFERENCE_CHARSET.len())] as char)
        .collect()
}

/// Append-only store of committed bookings, one table per domain.
///
/// Tables are created on first use; each commit runs in its own
/// transaction so a record is either fully stored or absent.
#[derive(Debug)]
pub struct BookingStore {
    conn: Mutex<Connection>,
}

impl BookingStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open(path)?),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist one record under a fresh reference number
    pub fn commit(&self, domain: &str, slots: &BTreeMap<String, String>) -> Result<BookingRecord> {
        let table = table_for(domain);
        let mut conn = self.lock();
        ensure_table(&conn, &table, slots.keys())?;

        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let reference_number = generate_reference_number();

            let mut columns = vec![quote_identifier("refer_number")];
            columns.extend(slots.keys().map(|k| quote_identifier(k)));
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(&table),
                columns.join(", "),
                placeholders
            );
            let values = std::iter::once(reference_number.clone()).chain(slots.values().cloned());

            let tx = conn.transaction()?;
            match tx.execute(&sql, params_from_iter(values)) {
                Ok(_) => {
                    tx.commit()?;
                    info!(
                        target: "tod_bench::booking",
                        domain,
                        reference = %reference_number,
                        "booking committed"
                    );
                    return Ok(BookingRecord {
                        domain: domain.to_string(),
                        reference_number,
                        slots: slots.clone(),
                    });
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    warn!(
                        target: "tod_bench::booking",
                        attempt,
                        "reference number collision, regenerating"
                    );
                    tx.rollback()?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AgentError::Config(format!(
            "could not allocate a unique reference number for {} after {} attempts",
            domain, MAX_REFERENCE_ATTEMPTS
        )))
    }

    /// Look a booking up by its reference number
    pub fn find(&self, domain: &str, reference_number: &str) -> Result<Option<BookingRecord>> {
        let table = table_for(domain);
        let conn = self.lock();
        if !table_exists(&conn, &table)? {
            return Ok(None);
        }

        let sql = format!(
            "SELECT * FROM {} WHERE refer_number = ?1",
            quote_identifier(&table)
        );
        let mut statement = conn.prepare(&sql)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let record = statement
            .query_row([reference_number], |row| read_record(domain, &columns, row))
            .optional()?;
        Ok(record)
    }

    /// Every booking of a domain in commit order
    pub fn records(&self, domain: &str) -> Result<Vec<BookingRecord>> {
        let table = table_for(domain);
        let conn = self.lock();
        if !table_exists(&conn, &table)? {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT * FROM {} ORDER BY id", quote_identifier(&table));
        let mut statement = conn.prepare(&sql)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let records = statement
            .query_map([], |row| read_record(domain, &columns, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn table_for(domain: &str) -> String {
    match BookingDomain::from_str(domain) {
        Ok(fixed) => fixed.table_name(),
        Err(_) => format!("{}_transaction", domain),
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(found)
}

/// Create the table if needed and add any column it is still missing
fn ensure_table<'a>(
    conn: &Connection,
    table: &str,
    columns: impl Iterator<Item = &'a String>,
) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            refer_number TEXT NOT NULL UNIQUE
        );",
        quote_identifier(table)
    ))?;

    let existing = {
        let mut statement = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        names
    };

    for column in columns {
        if !existing.iter().any(|name| name == column) {
            debug!(target: "tod_bench::booking", table, column = %column, "adding column");
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT;",
                quote_identifier(table),
                quote_identifier(column)
            ))?;
        }
    }
    Ok(())
}

fn read_record(
    domain: &str,
    columns: &[String],
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<BookingRecord> {
    let mut reference_number = String::new();
    let mut slots = BTreeMap::new();
    for (idx, column) in columns.iter().enumerate() {
        match column.as_str() {
            "id" => {}
            "refer_number" => reference_number = row.get(idx)?,
            _ => {
                if let Some(value) = row.get::<_, Option<String>>(idx)? {
                    slots.insert(column.clone(), value);
                }
            }
        }
    }
    Ok(BookingRecord {
        domain: domain.to_string(),
        reference_number,
        slots,
    })
}
