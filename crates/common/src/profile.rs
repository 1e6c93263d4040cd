//! Boundary validation for the untyped profiler payload.
//!
//! The upstream LLM profiler hands over loose JSON
//! (`{functions, problem_description, confidence}`). Everything past this
//! module works with the typed `ItemProfile`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Validated profiler output for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProfile {
    pub functions: Vec<String>,
    pub problem_description: String,
    /// Profiler self-reported confidence in [0,1].
    pub confidence: f64,
}

impl ItemProfile {
    /// Convert a raw profiler payload into a typed profile.
    ///
    /// `functions` entries are trimmed; empty names are dropped rather than
    /// counted, so whitespace noise cannot change the function count.
    /// Out-of-range confidence is clamped, not rejected.
    pub fn from_value(raw: &Value) -> Result<Self, Error> {
        let obj = raw
            .as_object()
            .ok_or_else(|| Error::Profile("payload is not a JSON object".into()))?;

        let functions = obj
            .get("functions")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Profile("missing or non-array 'functions'".into()))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| Error::Profile("non-string function name".into()))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();

        let problem_description = obj
            .get("problem_description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let confidence = obj
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Ok(Self {
            functions,
            problem_description,
            confidence,
        })
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}
