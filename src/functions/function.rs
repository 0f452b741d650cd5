use super::booking::{validate_booking, BookingDomain, BookingStore};
use super::query::{run_filter_query, run_sql_query, FormatLimits};
use super::taxi::book_taxi;
use super::venue::VenueStore;
use crate::error::Result;
use crate::schemas::{FunctionSpec, FunctionTarget, ParsedArguments};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Sentinel meaning the user has no preference for a slot
pub const DONTCARE: &str = "dontcare";

/// Stores a declared function runs against
#[derive(Debug, Clone)]
pub struct FunctionBackends {
    pub venues: Arc<VenueStore>,
    pub bookings: Arc<BookingStore>,
    pub limits: FormatLimits,
}

/// Read-only lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFunction {
    /// The agent writes the SQL itself
    Sql { table: String },
    /// Arguments become equality filters over `columns`
    Filter { table: String, columns: Vec<String> },
}

/// Operations that commit something and hand back a confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionFunction {
    Booking(BookingDomain),
    Taxi,
    Service { service: String },
}

/// A callable bound to its backing operation, built once from a
/// [`FunctionSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredFunction {
    Query(QueryFunction),
    Transaction(TransactionFunction),
}

impl DeclaredFunction {
    pub fn from_spec(spec: &FunctionSpec) -> Self {
        match &spec.target {
            FunctionTarget::SqlQuery { table } => {
                DeclaredFunction::Query(QueryFunction::Sql { table: table.clone() })
            }
            FunctionTarget::FilterQuery { table } => DeclaredFunction::Query(QueryFunction::Filter {
                table: table.clone(),
                columns: spec.result_slots.clone(),
            }),
            FunctionTarget::Booking { domain } => {
                DeclaredFunction::Transaction(TransactionFunction::Booking(*domain))
            }
            FunctionTarget::Taxi => DeclaredFunction::Transaction(TransactionFunction::Taxi),
            FunctionTarget::ServiceTransaction { service } => {
                DeclaredFunction::Transaction(TransactionFunction::Service {
                    service: service.clone(),
                })
            }
        }
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self, DeclaredFunction::Transaction(_))
    }

    /// Run the function and produce the text fed back to the agent.
    ///
    /// Rejections and query failures are part of the returned text; only
    /// storage faults are errors.
    pub fn invoke(&self, arguments: &ParsedArguments, backends: &FunctionBackends) -> Result<String> {
        match self {
            DeclaredFunction::Query(QueryFunction::Sql { table }) => {
                let sql = arguments
                    .get("sql")
                    .map(argument_text)
                    .unwrap_or_default();
                Ok(run_sql_query(&backends.venues, table, &sql, backends.limits))
            }
            DeclaredFunction::Query(QueryFunction::Filter { table, columns }) => {
                let filters: Vec<(String, String)> = arguments
                    .iter()
                    .map(|(name, value)| (name.clone(), argument_text(value)))
                    .filter(|(_, value)| value != DONTCARE)
                    .collect();
                Ok(run_filter_query(
                    &backends.venues,
                    table,
                    columns,
                    &filters,
                    backends.limits,
                ))
            }
            DeclaredFunction::Transaction(TransactionFunction::Booking(domain)) => {
                let info = argument_map(arguments);
                match validate_booking(*domain, &info, &backends.venues)? {
                    Ok(slots) => {
                        let record = backends.bookings.commit(domain.as_str(), &slots)?;
                        Ok(format!(
                            "Booking succeed. The reference number is {}.",
                            record.reference_number
                        ))
                    }
                    Err(rejection) => {
                        info!(
                            target: "tod_bench::booking",
                            domain = domain.as_str(),
                            kind = ?rejection.kind(),
                            "booking rejected"
                        );
                        Ok(rejection.to_string())
                    }
                }
            }
            DeclaredFunction::Transaction(TransactionFunction::Taxi) => {
                let info = argument_map(arguments);
                match book_taxi(&info, &backends.venues)? {
                    Ok(taxi) => Ok(taxi.message()),
                    Err(rejection) => {
                        info!(
                            target: "tod_bench::booking",
                            domain = "taxi",
                            kind = ?rejection.kind(),
                            "booking rejected"
                        );
                        Ok(rejection.to_string())
                    }
                }
            }
            DeclaredFunction::Transaction(TransactionFunction::Service { service }) => {
                let record = backends.bookings.commit(service, &argument_map(arguments))?;
                debug!(target: "tod_bench::booking", service = %service, slots = record.slots.len(), "transaction stored");
                Ok(format!(
                    "Transaction succeed. The reference number is {}.",
                    record.reference_number
                ))
            }
        }
    }
}

/// Text form of an argument value as stored and compared in the databases
pub fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn argument_map(arguments: &ParsedArguments) -> BTreeMap<String, String> {
    arguments
        .iter()
        .map(|(name, value)| (name.clone(), argument_text(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::venue::tests::sample_store;
    use serde_json::json;

    fn backends() -> FunctionBackends {
        FunctionBackends {
            venues: Arc::new(sample_store()),
            bookings: Arc::new(BookingStore::in_memory().unwrap()),
            limits: FormatLimits::default(),
        }
    }

    fn arguments(value: Value) -> ParsedArguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_argument_text() {
        assert_eq!(argument_text(&json!("north")), "north");
        assert_eq!(argument_text(&json!(2)), "2");
        assert_eq!(argument_text(&json!(true)), "True");
        assert_eq!(argument_text(&Value::Null), "");
    }

    #[test]
    fn test_integer_people_is_booked() {
        let backends = backends();
        let function = DeclaredFunction::Transaction(TransactionFunction::Booking(
            BookingDomain::Restaurant,
        ));
        let result = function
            .invoke(
                &arguments(json!({"name": "golden wok", "people": 4, "day": "friday", "time": "19:30"})),
                &backends,
            )
            .unwrap();
        assert!(result.starts_with("Booking succeed. The reference number is "));
        let records = backends.bookings.records("restaurant").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slots["people"], "4");
    }

    #[test]
    fn test_rejected_booking_writes_nothing() {
        let backends = backends();
        let function =
            DeclaredFunction::Transaction(TransactionFunction::Booking(BookingDomain::Hotel));
        let result = function
            .invoke(
                &arguments(json!({"name": "no such hotel", "people": 1, "day": "monday", "stay": 2})),
                &backends,
            )
            .unwrap();
        assert!(result.contains("is not found in the hotel database"));
        assert!(backends.bookings.records("hotel").unwrap().is_empty());
    }

    #[test]
    fn test_filter_query_ignores_dontcare() {
        let backends = backends();
        let function = DeclaredFunction::Query(QueryFunction::Filter {
            table: "restaurant".to_string(),
            columns: vec!["name".to_string()],
        });
        let result = function
            .invoke(
                &arguments(json!({"area": "north", "food": "dontcare"})),
                &backends,
            )
            .unwrap();
        assert_eq!(result, "| name |\n| --- |\n| golden wok |");
    }

    #[test]
    fn test_service_transaction() {
        let backends = backends();
        let function = DeclaredFunction::Transaction(TransactionFunction::Service {
            service: "Buses_1".to_string(),
        });
        let result = function
            .invoke(
                &arguments(json!({"from_location": "Anaheim", "group_size": 2})),
                &backends,
            )
            .unwrap();
        let reference = result
            .strip_prefix("Transaction succeed. The reference number is ")
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap();
        let record = backends.bookings.find("Buses_1", reference).unwrap().unwrap();
        assert_eq!(record.slots["group_size"], "2");
    }
}
