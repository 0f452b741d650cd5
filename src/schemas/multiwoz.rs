//! The fixed four-domain family: SQL query functions over the venue
//! catalogue plus the hard-coded booking functions.

use super::registry::{
    FunctionSpec, FunctionTarget, SchemaRegistry, ServiceSchema, SlotSpec, SlotType, SlotValues,
};
use crate::error::{AgentError, Result};
use crate::functions::{BookingDomain, VenueStore};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const QUERY_DOMAINS: [&str; 4] = ["restaurant", "hotel", "attraction", "train"];
pub const SERVICE_NAMES: [&str; 5] = ["restaurant", "hotel", "attraction", "train", "taxi"];
const TABLE_SAMPLE_ROWS: usize = 2;

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
#[allow(dead_code)]
enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Deserialize, JsonSchema)]
#[allow(dead_code)]
struct BookRestaurantArgs {
    /// the name of the restaurant to book
    name: String,
    /// the number of people
    people: u32,
    /// the day when the people go to the restaurant
    day: Weekday,
    /// the time of the reservation
    time: String,
}

#[derive(Deserialize, JsonSchema)]
#[allow(dead_code)]
struct BookHotelArgs {
    /// the name of the hotel to book
    name: String,
    /// the number of people
    people: u32,
    /// the day when the reservation starts
    day: Weekday,
    /// the number of days of the reservation
    stay: u32,
}

#[derive(Deserialize, JsonSchema)]
#[allow(dead_code)]
struct BuyTrainTicketsArgs {
    /// the unique id of the train
    train_id: String,
    /// the number of tickets to buy
    tickets: u32,
}

#[derive(Deserialize, JsonSchema)]
#[allow(dead_code)]
struct BookTaxiArgs {
    /// the departure of the taxi
    departure: String,
    /// the destination of the taxi
    destination: String,
    /// the leave time of the taxi
    leave_time: Option<String>,
    /// the arrive time of the taxi
    arrive_time: Option<String>,
}

fn schema_value<T: JsonSchema>() -> Result<Value> {
    let settings = SchemaSettings::draft07().with(|s| s.inline_subschemas = true);
    let schema = settings.into_generator().into_root_schema_for::<T>();
    Ok(serde_json::to_value(schema)?)
}

fn property_type(property: &Value) -> SlotType {
    let type_name = match property.get("type") {
        Some(Value::String(name)) => Some(name.as_str()),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null"),
        _ => None,
    };
    match type_name {
        Some("integer") => SlotType::Integer,
        Some("number") => SlotType::Number,
        Some("boolean") => SlotType::Boolean,
        _ => SlotType::String,
    }
}

/// Merge a single `allOf` wrapper into the property itself
fn flatten_property(property: &Value) -> Value {
    let mut merged = property.clone();
    if let Some(Value::Array(parts)) = property.get("allOf") {
        if let Some(object) = merged.as_object_mut() {
            object.remove("allOf");
            for part in parts.iter().filter_map(Value::as_object) {
                for (key, value) in part {
                    object.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }
    merged
}

/// Build a function declaration from the derived schema of its argument
/// struct
fn booking_function<T: JsonSchema>(
    name: &str,
    description: &str,
    target: FunctionTarget,
) -> Result<FunctionSpec> {
    let schema = schema_value::<T>()?;
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| AgentError::Config(format!("argument schema of \"{}\" has no properties", name)))?;
    let required: Vec<String> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut slots = BTreeMap::new();
    let mut optional_slots = BTreeMap::new();
    for (slot_name, property) in properties {
        let property = flatten_property(property);
        let slot_type = property_type(&property);
        let description = property
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut slot = SlotSpec::new(slot_name.clone(), description, slot_type);
        if let Some(Value::Array(values)) = property.get("enum") {
            slot = slot.with_values(SlotValues::Enumerated(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ));
        }
        slots.insert(slot_name.clone(), slot);
        if !required.contains(slot_name) {
            optional_slots.insert(slot_name.clone(), String::new());
        }
    }

    Ok(FunctionSpec {
        name: name.to_string(),
        description: description.to_string(),
        is_transactional: true,
        required_slots: required,
        optional_slots,
        result_slots: Vec::new(),
        slots,
        target,
    })
}

fn query_function(domain: &str, table_info: &str) -> FunctionSpec {
    let mut slots = BTreeMap::new();
    slots.insert(
        "sql".to_string(),
        SlotSpec::new(
            "sql",
            format!("The SQL statement to query the {} table.", domain),
            SlotType::String,
        ),
    );

    FunctionSpec {
        name: format!("query_{}s", domain),
        description: format!(
            "Use an SQL statement to query the {} table to get required information.\n\nTable Schema:\n{}",
            domain, table_info
        ),
        is_transactional: false,
        required_slots: vec!["sql".to_string()],
        optional_slots: BTreeMap::new(),
        result_slots: Vec::new(),
        slots,
        target: FunctionTarget::SqlQuery {
            table: domain.to_string(),
        },
    }
}

/// Declare every function of the fixed family, one service per domain
pub fn build_services(venues: &VenueStore) -> Result<Vec<ServiceSchema>> {
    let mut services = Vec::new();

    for domain in SERVICE_NAMES {
        let mut functions = Vec::new();
        if QUERY_DOMAINS.contains(&domain) {
            let table_info = venues.table_info(domain, TABLE_SAMPLE_ROWS)?;
            functions.push(query_function(domain, &table_info));
        }

        match domain {
            "restaurant" => functions.push(booking_function::<BookRestaurantArgs>(
                "book_restaurant",
                "Book a restaurant with certain requirements.",
                FunctionTarget::Booking {
                    domain: BookingDomain::Restaurant,
                },
            )?),
            "hotel" => functions.push(booking_function::<BookHotelArgs>(
                "book_hotel",
                "Book a hotel with certain requirements.",
                FunctionTarget::Booking {
                    domain: BookingDomain::Hotel,
                },
            )?),
            "train" => functions.push(booking_function::<BuyTrainTicketsArgs>(
                "buy_train_tickets",
                "Buy train tickets.",
                FunctionTarget::Booking {
                    domain: BookingDomain::Train,
                },
            )?),
            "taxi" => functions.push(booking_function::<BookTaxiArgs>(
                "book_taxi",
                "Book a taxi with certain requirements.",
                FunctionTarget::Taxi,
            )?),
            _ => {}
        }

        services.push(ServiceSchema {
            service_name: domain.to_string(),
            description: format!("{} search and booking", domain),
            functions,
        });
    }

    Ok(services)
}

pub fn build_registry(venues: &VenueStore) -> Result<SchemaRegistry> {
    SchemaRegistry::new(build_services(venues)?)
}
