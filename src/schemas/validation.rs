use super::registry::{FunctionSpec, SchemaRegistry, SlotType};
use crate::core::function_call::RawFunctionCall;
use crate::functions::{argument_text, DONTCARE};
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

const MAX_REPORTED_VIOLATIONS: usize = 3;

/// Decoded arguments of a call that passed validation
pub type ParsedArguments = Map<String, Value>;

/// Tag of a [`ValidationError`], for branching without matching on text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    MissingCall,
    UnknownFunction,
    MalformedArguments,
    UnexpectedParameters,
    MissingParameters,
    ValueNotAllowed,
}

/// A rejected call. The `Display` text is replayed to the agent verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No \"function_call\" provided.")]
    MissingCall,

    #[error("Function {name} does not exist and cannot be called.")]
    UnknownFunction { name: String },

    #[error("Invalid json parameters with the exception {class}: {message}.")]
    MalformedArguments { class: String, message: String },

    #[error(
        "Parameters {} are not valid. Please provide the valid parameters {}.",
        quoted(.unexpected),
        quoted(.valid)
    )]
    UnexpectedParameters {
        unexpected: Vec<String>,
        valid: Vec<String>,
    },

    #[error("The required parameters {} are missing.", quoted(.missing))]
    MissingParameters { missing: Vec<String> },

    #[error("{}", describe_violations(.violations, .truncated))]
    ValueNotAllowed {
        violations: Vec<ValueViolation>,
        truncated: bool,
    },
}

/// One argument outside its slot's enumerated values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueViolation {
    pub slot: String,
    pub allowed: Vec<String>,
}

impl ValidationError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            ValidationError::MissingCall => ValidationKind::MissingCall,
            ValidationError::UnknownFunction { .. } => ValidationKind::UnknownFunction,
            ValidationError::MalformedArguments { .. } => ValidationKind::MalformedArguments,
            ValidationError::UnexpectedParameters { .. } => ValidationKind::UnexpectedParameters,
            ValidationError::MissingParameters { .. } => ValidationKind::MissingParameters,
            ValidationError::ValueNotAllowed { .. } => ValidationKind::ValueNotAllowed,
        }
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_violations(violations: &[ValueViolation], truncated: &bool) -> String {
    let mut text = violations
        .iter()
        .map(|v| {
            format!(
                "The value of \"{}\" is not allowed. Please choose one of {}.",
                v.slot,
                quoted(&v.allowed)
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    if *truncated {
        text.push_str(" Other parameters have invalid values too.");
    }
    text
}

/// Decide whether a proposed call can be dispatched.
///
/// Checks run in a fixed order and stop at the first failure. On success
/// the decoded arguments are returned unchanged.
pub fn validate(
    call: Option<&RawFunctionCall>,
    registry: &SchemaRegistry,
) -> std::result::Result<ParsedArguments, ValidationError> {
    let call = call.ok_or(ValidationError::MissingCall)?;

    let function = registry
        .find_function(&call.name)
        .ok_or_else(|| ValidationError::UnknownFunction {
            name: call.name.clone(),
        })?;

    let arguments = decode_flat_arguments(&call.arguments)?;

    let unexpected: Vec<String> = arguments
        .keys()
        .filter(|key| !function.is_declared(key))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        return Err(ValidationError::UnexpectedParameters {
            unexpected,
            valid: function
                .declared_parameters()
                .into_iter()
                .map(str::to_string)
                .collect(),
        });
    }

    let missing: Vec<String> = function
        .required_slots
        .iter()
        .filter(|slot| !arguments.contains_key(*slot))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingParameters { missing });
    }

    if !function.is_transactional {
        check_enumerated_values(function, &arguments)?;
    }

    Ok(arguments)
}

/// Decode arguments that must form an object of scalar values.
///
/// An empty payload does not decode; a call without arguments sends `{}`.
pub fn decode_flat_arguments(raw: &str) -> std::result::Result<ParsedArguments, ValidationError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| ValidationError::MalformedArguments {
            class: format!("{:?}Error", err.classify()),
            message: err.to_string(),
        })?;

    let Value::Object(arguments) = value else {
        return Err(ValidationError::MalformedArguments {
            class: "TypeError".to_string(),
            message: "the arguments must be a JSON object".to_string(),
        });
    };

    if let Some((key, _)) = arguments
        .iter()
        .find(|(_, value)| matches!(value, Value::Array(_) | Value::Object(_)))
    {
        return Err(ValidationError::MalformedArguments {
            class: "TypeError".to_string(),
            message: format!("the value of \"{}\" must be a string, number or boolean", key),
        });
    }

    Ok(arguments)
}

fn check_enumerated_values(
    function: &FunctionSpec,
    arguments: &ParsedArguments,
) -> std::result::Result<(), ValidationError> {
    let mut properties = Map::new();
    let mut instance = Map::new();

    for (name, value) in arguments {
        let Some(slot) = function.slot(name) else {
            continue;
        };
        if slot.slot_type == SlotType::Boolean {
            continue;
        }
        let Some(allowed) = slot.enumerated_values() else {
            continue;
        };
        let mut choices: Vec<Value> = allowed.iter().map(|v| json!(v)).collect();
        choices.push(json!(DONTCARE));
        properties.insert(name.clone(), json!({ "enum": choices }));
        instance.insert(name.clone(), json!(argument_text(value)));
    }

    if properties.is_empty() {
        return Ok(());
    }

    let schema = json!({ "type": "object", "properties": properties });
    let validator = match JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
    {
        Ok(validator) => validator,
        Err(err) => {
            warn!(
                target: "tod_bench::validation",
                function = %function.name,
                error = %err,
                "skipping enumeration check"
            );
            return Ok(());
        }
    };

    let instance = Value::Object(instance);
    let result = validator.validate(&instance);
    let Err(errors) = result else {
        return Ok(());
    };

    let mut slots = BTreeSet::new();
    for error in errors {
        let path = error.instance_path.to_string();
        slots.insert(path.trim_start_matches('/').to_string());
    }

    let truncated = slots.len() > MAX_REPORTED_VIOLATIONS;
    let violations = slots
        .into_iter()
        .take(MAX_REPORTED_VIOLATIONS)
        .map(|slot| ValueViolation {
            allowed: function
                .slot(&slot)
                .and_then(|spec| spec.enumerated_values())
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            slot,
        })
        .collect();

    Err(ValidationError::ValueNotAllowed {
        violations,
        truncated,
    })
}
