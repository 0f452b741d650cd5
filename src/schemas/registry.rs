use crate::error::{AgentError, Result};
use crate::functions::BookingDomain;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Value type of a slot, either hard-coded or inferred from venue data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    String,
    Integer,
    Number,
    Boolean,
}

impl SlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::String => "string",
            SlotType::Integer => "integer",
            SlotType::Number => "number",
            SlotType::Boolean => "boolean",
        }
    }

    /// Infer a column type from sampled values.
    ///
    /// Returns `None` when there is nothing to infer from.
    pub fn infer<'a>(samples: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let samples: Vec<&str> = samples.into_iter().collect();
        if samples.is_empty() {
            return None;
        }

        let slot_type = if samples
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        {
            SlotType::Integer
        } else if samples.iter().all(|s| s.parse::<f64>().is_ok()) {
            SlotType::Number
        } else if samples
            .iter()
            .all(|s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false"))
        {
            SlotType::Boolean
        } else {
            SlotType::String
        };
        Some(slot_type)
    }

    /// Render a declared value as JSON of this type, falling back to the
    /// raw string when it does not parse
    pub fn typed_value(&self, raw: &str) -> Value {
        match self {
            SlotType::String => json!(raw),
            SlotType::Integer => raw.parse::<i64>().map(Value::from).unwrap_or(json!(raw)),
            SlotType::Number => raw.parse::<f64>().map(Value::from).unwrap_or(json!(raw)),
            SlotType::Boolean => json!(raw.eq_ignore_ascii_case("true")),
        }
    }
}

/// Closed or open set of values a slot is expected to take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum SlotValues {
    Free,
    Enumerated(Vec<String>),
    Examples(Vec<String>),
}

/// One parameter of a function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    pub description: String,
    pub slot_type: SlotType,
    pub values: SlotValues,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            slot_type,
            values: SlotValues::Free,
        }
    }

    pub fn with_values(mut self, values: SlotValues) -> Self {
        self.values = values;
        self
    }

    pub fn enumerated_values(&self) -> Option<&[String]> {
        match &self.values {
            SlotValues::Enumerated(values) => Some(values),
            _ => None,
        }
    }

    fn property_schema(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".to_string(), json!(self.slot_type.as_str()));
        property.insert("description".to_string(), json!(self.description));

        if self.slot_type != SlotType::Boolean {
            match &self.values {
                SlotValues::Enumerated(values) => {
                    let typed: Vec<Value> =
                        values.iter().map(|v| self.slot_type.typed_value(v)).collect();
                    property.insert("enum".to_string(), Value::Array(typed));
                }
                SlotValues::Examples(values) if !values.is_empty() => {
                    let typed: Vec<Value> =
                        values.iter().map(|v| self.slot_type.typed_value(v)).collect();
                    property.insert("examples".to_string(), Value::Array(typed));
                }
                _ => {}
            }
        }

        Value::Object(property)
    }
}

/// What a declared function is bound to when dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionTarget {
    /// Agent-written SQL against one venue table
    SqlQuery { table: String },
    /// Equality filters over the result slots of one venue table
    FilterQuery { table: String },
    /// Fixed-domain reservation
    Booking { domain: BookingDomain },
    /// Taxi booking, never persisted
    Taxi,
    /// Dynamic-service transaction
    ServiceTransaction { service: String },
}

/// One callable operation of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub is_transactional: bool,
    pub required_slots: Vec<String>,
    /// Optional slot name to its default value
    pub optional_slots: BTreeMap<String, String>,
    pub result_slots: Vec<String>,
    pub slots: BTreeMap<String, SlotSpec>,
    pub target: FunctionTarget,
}

impl FunctionSpec {
    /// Check the declaration is self-consistent
    pub fn check(&self) -> Result<()> {
        if let Some(overlap) = self
            .required_slots
            .iter()
            .find(|slot| self.optional_slots.contains_key(*slot))
        {
            return Err(AgentError::Config(format!(
                "function \"{}\" declares \"{}\" as both required and optional",
                self.name, overlap
            )));
        }

        if let Some(undeclared) = self
            .declared_parameters()
            .into_iter()
            .find(|slot| !self.slots.contains_key(*slot))
        {
            return Err(AgentError::Config(format!(
                "function \"{}\" has no slot definition for \"{}\"",
                self.name, undeclared
            )));
        }

        Ok(())
    }

    /// Required slots followed by optional ones, in declaration order
    pub fn declared_parameters(&self) -> Vec<&str> {
        self.required_slots
            .iter()
            .map(String::as_str)
            .chain(self.optional_slots.keys().map(String::as_str))
            .collect()
    }

    pub fn is_declared(&self, parameter: &str) -> bool {
        self.required_slots.iter().any(|slot| slot == parameter)
            || self.optional_slots.contains_key(parameter)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.get(name)
    }

    /// Serialize as a function definition for the chat completion API
    pub fn to_definition(&self) -> Value {
        let properties: Map<String, Value> = self
            .declared_parameters()
            .into_iter()
            .filter_map(|name| {
                self.slots
                    .get(name)
                    .map(|slot| (name.to_string(), slot.property_schema()))
            })
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": self.required_slots,
            }
        })
    }
}

/// Immutable description of one callable domain or service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSchema {
    pub service_name: String,
    pub description: String,
    pub functions: Vec<FunctionSpec>,
}

/// Index of every service and function declared for a run.
///
/// Built once at start-up and shared by reference; nothing mutates it after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    services: BTreeMap<String, ServiceSchema>,
    order: Vec<String>,
    by_function: HashMap<String, (String, usize)>,
}

impl SchemaRegistry {
    pub fn new(services: impl IntoIterator<Item = ServiceSchema>) -> Result<Self> {
        let mut registry = Self::default();

        for service in services {
            if registry.services.contains_key(&service.service_name) {
                return Err(AgentError::Config(format!(
                    "service \"{}\" declared twice",
                    service.service_name
                )));
            }

            for (idx, function) in service.functions.iter().enumerate() {
                function.check()?;
                let previous = registry.by_function.insert(
                    function.name.clone(),
                    (service.service_name.clone(), idx),
                );
                if previous.is_some() {
                    return Err(AgentError::Config(format!(
                        "function \"{}\" declared more than once",
                        function.name
                    )));
                }
            }

            registry.order.push(service.service_name.clone());
            registry
                .services
                .insert(service.service_name.clone(), service);
        }

        Ok(registry)
    }

    pub fn service(&self, service_name: &str) -> Result<&ServiceSchema> {
        self.services
            .get(service_name)
            .ok_or_else(|| AgentError::UnknownService(service_name.to_string()))
    }

    pub fn get_function(&self, service_name: &str, function_name: &str) -> Result<&FunctionSpec> {
        self.service(service_name)?
            .functions
            .iter()
            .find(|function| function.name == function_name)
            .ok_or_else(|| AgentError::UnknownFunction {
                service: service_name.to_string(),
                function: function_name.to_string(),
            })
    }

    /// Look a function up by its globally unique name
    pub fn find_function(&self, function_name: &str) -> Option<&FunctionSpec> {
        let (service_name, idx) = self.by_function.get(function_name)?;
        self.services
            .get(service_name)
            .and_then(|service| service.functions.get(*idx))
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceSchema> {
        self.order.iter().filter_map(|name| self.services.get(name))
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.services().flat_map(|service| service.functions.iter())
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Registry restricted to the services of one dialogue
    pub fn subset<S: AsRef<str>>(&self, service_names: &[S]) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut selected = Vec::new();
        for name in service_names {
            let name = name.as_ref();
            if seen.insert(name) {
                selected.push(self.service(name)?.clone());
            }
        }
        Self::new(selected)
    }

    /// Function definitions handed to the agent model
    pub fn function_definitions(&self) -> Vec<Value> {
        self.functions().map(FunctionSpec::to_definition).collect()
    }
}
