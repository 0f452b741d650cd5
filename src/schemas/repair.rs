//! Text-level fixes for known malformed-call patterns, applied before
//! validation.
//!
//! Every fix is best-effort and a fixed point: repairing a repaired call
//! returns it unchanged. Input matching no pattern passes through as-is.

use crate::core::function_call::RawFunctionCall;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fmt;

/// A single-quoted SQL literal compared with `=`, ending where the
/// statement or the condition ends
static SQL_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(=\s*)'(.*?)'(\s*(?:$|;|\)|\band\b|\bor\b|\border\b|\blimit\b|\bgroup\b))")
        .expect("valid regex")
});

/// Known fixes, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    /// `\'` is not a JSON escape; dropping the backslash lets the payload decode
    InvalidQuoteEscape,
    /// An apostrophe inside a quoted SQL literal is doubled
    SqlLiteralQuote,
    /// `namespace.function` becomes `function`
    DottedName,
}

impl fmt::Display for RepairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairKind::InvalidQuoteEscape => "invalid_quote_escape",
            RepairKind::SqlLiteralQuote => "sql_literal_quote",
            RepairKind::DottedName => "dotted_name",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub call: RawFunctionCall,
    pub applied: Vec<RepairKind>,
}

impl RepairOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.applied.is_empty()
    }
}

pub fn repair(call: &RawFunctionCall) -> RepairOutcome {
    let mut applied = Vec::new();

    let mut arguments = call.arguments.clone();
    if let Some(fixed) = drop_invalid_quote_escapes(&arguments) {
        arguments = fixed;
        applied.push(RepairKind::InvalidQuoteEscape);
    }
    if let Some(fixed) = escape_sql_literals(&arguments) {
        arguments = fixed;
        applied.push(RepairKind::SqlLiteralQuote);
    }

    let name = match call.name.rsplit_once('.') {
        Some((_, last)) => {
            applied.push(RepairKind::DottedName);
            last.to_string()
        }
        None => call.name.clone(),
    };

    RepairOutcome {
        call: RawFunctionCall { name, arguments },
        applied,
    }
}

fn drop_invalid_quote_escapes(arguments: &str) -> Option<String> {
    if !arguments.contains("\\'") || serde_json::from_str::<Value>(arguments).is_ok() {
        return None;
    }
    let candidate = arguments.replace("\\'", "'");
    serde_json::from_str::<Value>(&candidate).ok()?;
    Some(candidate)
}

fn escape_sql_literals(arguments: &str) -> Option<String> {
    let Ok(Value::Object(mut decoded)) = serde_json::from_str::<Value>(arguments) else {
        return None;
    };
    let Some(Value::String(sql)) = decoded.get("sql") else {
        return None;
    };

    let fixed = SQL_LITERAL.replace_all(sql, |caps: &Captures<'_>| {
        let body = caps[2].replace("''", "'").replace('\'', "''");
        format!("{}'{}'{}", &caps[1], body, &caps[3])
    });
    if fixed == *sql {
        return None;
    }

    let fixed = fixed.into_owned();
    decoded.insert("sql".to_string(), Value::String(fixed));
    serde_json::to_string(&decoded).ok()
}
