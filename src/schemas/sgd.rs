//! The dynamic multi-service family, loaded from `schema.json` files.

use super::decode::read_document;
use super::registry::{
    FunctionSpec, FunctionTarget, SchemaRegistry, ServiceSchema, SlotSpec, SlotType, SlotValues,
};
use crate::error::{AgentError, Result};
use crate::functions::VenueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const QUERY_SUFFIX: &str = " (Query function. Return db recored that meets conditions.)";
const TRANSACTION_SUFFIX: &str =
    " (Transaction function. Return a reference number when calling succeeds.)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdSlot {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub is_categorical: bool,
    #[serde(default)]
    pub possible_values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdIntent {
    pub name: String,
    pub description: String,
    pub is_transactional: bool,
    #[serde(default)]
    pub required_slots: Vec<String>,
    #[serde(default)]
    pub optional_slots: BTreeMap<String, String>,
    #[serde(default)]
    pub result_slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdService {
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    pub slots: Vec<SgdSlot>,
    pub intents: Vec<SgdIntent>,
}

impl SgdService {
    pub fn slot(&self, name: &str) -> Option<&SgdSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn intent(&self, name: &str) -> Option<&SgdIntent> {
        self.intents.iter().find(|intent| intent.name == name)
    }
}

/// Service definitions from one or more schema files.
///
/// A service declared in several files keeps its last definition.
#[derive(Debug, Clone, Default)]
pub struct SgdCatalog {
    services: Vec<SgdService>,
}

impl SgdCatalog {
    pub fn new(services: impl IntoIterator<Item = SgdService>) -> Self {
        let mut catalog = Self::default();
        for service in services {
            match catalog
                .services
                .iter_mut()
                .find(|known| known.service_name == service.service_name)
            {
                Some(known) => *known = service,
                None => catalog.services.push(service),
            }
        }
        catalog
    }

    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut services = Vec::new();
        for path in paths {
            let loaded: Vec<SgdService> = read_document(path)?;
            debug!(
                target: "tod_bench::schemas",
                path = %path.as_ref().display(),
                services = loaded.len(),
                "loaded schema file"
            );
            services.extend(loaded);
        }
        Ok(Self::new(services))
    }

    pub fn service(&self, name: &str) -> Result<&SgdService> {
        self.services
            .iter()
            .find(|service| service.service_name == name)
            .ok_or_else(|| AgentError::UnknownService(name.to_string()))
    }

    pub fn services(&self) -> &[SgdService] {
        &self.services
    }

    /// Build the registry, inferring slot types from the venue tables.
    ///
    /// Inference runs once here; the registry carries the result.
    pub fn build_registry(&self, venues: &VenueStore) -> Result<SchemaRegistry> {
        let services = self
            .services
            .iter()
            .map(|service| build_service(service, venues))
            .collect::<Result<Vec<_>>>()?;
        let registry = SchemaRegistry::new(services)?;
        info!(
            target: "tod_bench::schemas",
            services = registry.service_names().len(),
            functions = registry.functions().count(),
            "built service registry"
        );
        Ok(registry)
    }
}

fn infer_slot_type(service: &SgdService, slot: &SgdSlot, venues: &VenueStore) -> Result<SlotType> {
    let samples = venues.column_samples(&service.service_name, &slot.name)?;
    if let Some(inferred) = SlotType::infer(samples.iter().map(String::as_str)) {
        return Ok(inferred);
    }

    let mut values: Vec<&str> = slot.possible_values.iter().map(String::as_str).collect();
    values.sort_unstable();
    values.dedup();
    if values == ["False", "True"] {
        Ok(SlotType::Boolean)
    } else {
        Ok(SlotType::String)
    }
}

fn build_service(service: &SgdService, venues: &VenueStore) -> Result<ServiceSchema> {
    let mut slot_specs = BTreeMap::new();
    for slot in &service.slots {
        let slot_type = infer_slot_type(service, slot, venues)?;
        let values = match (slot.possible_values.is_empty(), slot.is_categorical) {
            (true, _) => SlotValues::Free,
            (false, true) => SlotValues::Enumerated(slot.possible_values.clone()),
            (false, false) => SlotValues::Examples(slot.possible_values.clone()),
        };
        slot_specs.insert(
            slot.name.clone(),
            SlotSpec::new(slot.name.clone(), slot.description.clone(), slot_type).with_values(values),
        );
    }

    let functions = service
        .intents
        .iter()
        .map(|intent| {
            let declared: BTreeMap<String, SlotSpec> = intent
                .required_slots
                .iter()
                .chain(intent.optional_slots.keys())
                .chain(intent.result_slots.iter())
                .filter_map(|name| slot_specs.get(name).map(|spec| (name.clone(), spec.clone())))
                .collect();

            let suffix = if intent.is_transactional {
                TRANSACTION_SUFFIX
            } else {
                QUERY_SUFFIX
            };
            let target = if intent.is_transactional {
                FunctionTarget::ServiceTransaction {
                    service: service.service_name.clone(),
                }
            } else {
                FunctionTarget::FilterQuery {
                    table: service.service_name.clone(),
                }
            };

            FunctionSpec {
                name: format!("{}_{}", service.service_name, intent.name),
                description: format!("{}.{}", intent.description, suffix),
                is_transactional: intent.is_transactional,
                required_slots: intent.required_slots.clone(),
                optional_slots: intent.optional_slots.clone(),
                result_slots: intent.result_slots.clone(),
                slots: declared,
                target,
            }
        })
        .collect();

    Ok(ServiceSchema {
        service_name: service.service_name.clone(),
        description: service.description.clone(),
        functions,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rusqlite::Connection;
    use serde_json::json;

    pub(crate) fn buses_catalog() -> SgdCatalog {
        let services: Vec<SgdService> = serde_json::from_value(json!([{
            "service_name": "Buses_1",
            "description": "Book bus journeys from the biggest bus network in the country",
            "slots": [
                {"name": "from_location", "description": "City where bus is leaving from",
                 "is_categorical": false, "possible_values": []},
                {"name": "to_location", "description": "City where bus is going to",
                 "is_categorical": false, "possible_values": []},
                {"name": "travelers", "description": "Number of travelers for journey",
                 "is_categorical": true, "possible_values": ["1", "2", "3", "4", "5"]},
                {"name": "fare", "description": "Fare per ticket for journey",
                 "is_categorical": false, "possible_values": []},
                {"name": "refundable", "description": "Whether the ticket can be refunded",
                 "is_categorical": true, "possible_values": ["True", "False"]}
            ],
            "intents": [
                {"name": "FindBus", "description": "Find a bus journey for a given pair of cities",
                 "is_transactional": false,
                 "required_slots": ["from_location", "to_location"],
                 "optional_slots": {"travelers": "1"},
                 "result_slots": ["from_location", "to_location", "travelers", "fare"]},
                {"name": "BuyBusTicket", "description": "Buy tickets for a bus journey",
                 "is_transactional": true,
                 "required_slots": ["from_location", "to_location", "travelers"],
                 "optional_slots": {"refundable": "False"},
                 "result_slots": []}
            ]
        }]))
        .unwrap();
        SgdCatalog::new(services)
    }

    pub(crate) fn buses_store() -> VenueStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE "Buses_1" (from_location TEXT, to_location TEXT, travelers TEXT, fare TEXT);
            INSERT INTO "Buses_1" VALUES
                ('Anaheim', 'Fresno', '2', '42.5'),
                ('Anaheim', 'Fresno', '1', '39'),
                ('Fresno', 'Los Angeles', '3', '27');
            "#,
        )
        .unwrap();
        VenueStore::from_connection(conn).unwrap()
    }

    #[test]
    fn test_function_names_and_descriptions() {
        let registry = buses_catalog().build_registry(&buses_store()).unwrap();
        let find = registry.find_function("Buses_1_FindBus").unwrap();
        assert_eq!(
            find.description,
            "Find a bus journey for a given pair of cities. (Query function. Return db recored that meets conditions.)"
        );
        assert_eq!(
            find.target,
            FunctionTarget::FilterQuery {
                table: "Buses_1".to_string()
            }
        );
        let buy = registry.find_function("Buses_1_BuyBusTicket").unwrap();
        assert!(buy.is_transactional);
        assert!(buy.description.ends_with(TRANSACTION_SUFFIX));
    }

    #[test]
    fn test_slot_types_inferred_from_table() {
        let registry = buses_catalog().build_registry(&buses_store()).unwrap();
        let find = registry.find_function("Buses_1_FindBus").unwrap();
        assert_eq!(find.slot("travelers").unwrap().slot_type, SlotType::Integer);
        assert_eq!(find.slot("fare").unwrap().slot_type, SlotType::Number);
        assert_eq!(find.slot("from_location").unwrap().slot_type, SlotType::String);

        let buy = registry.find_function("Buses_1_BuyBusTicket").unwrap();
        // no column to sample, falls back on the declared values
        assert_eq!(buy.slot("refundable").unwrap().slot_type, SlotType::Boolean);

        let definition = find.to_definition();
        assert_eq!(
            definition["parameters"]["properties"]["travelers"]["enum"],
            json!([1, 2, 3, 4, 5])
        );
    }

    #[test]
    fn test_later_definition_wins() {
        let mut services = buses_catalog().services().to_vec();
        let mut second = services[0].clone();
        second.description = "second".to_string();
        services.push(second);
        let catalog = SgdCatalog::new(services);
        assert_eq!(catalog.services().len(), 1);
        assert_eq!(catalog.service("Buses_1").unwrap().description, "second");
        assert!(matches!(
            catalog.service("Trains_1"),
            Err(AgentError::UnknownService(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(
            &path,
            serde_json::to_string(buses_catalog().services()).unwrap(),
        )
        .unwrap();
        let catalog = SgdCatalog::load(&[&path]).unwrap();
        assert!(catalog.service("Buses_1").unwrap().intent("FindBus").is_some());
    }
}
