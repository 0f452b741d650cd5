use crate::error::{AgentError, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Decode a JSON document, reporting the path of the first mismatch
pub fn decode_document<T: DeserializeOwned>(document: &str, text: &str) -> Result<T> {
    let deserializer = &mut serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(deserializer).map_err(|err| AgentError::Decode {
        document: document.to_string(),
        path: err.path().to_string(),
        message: err.inner().to_string(),
    })
}

/// Read and decode a JSON file
pub fn read_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    decode_document(&path.display().to_string(), &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Slot {
        #[allow(dead_code)]
        name: String,
        #[allow(dead_code)]
        is_categorical: bool,
    }

    #[derive(Debug, Deserialize)]
    struct Service {
        #[allow(dead_code)]
        slots: Vec<Slot>,
    }

    #[test]
    fn test_error_carries_path() {
        let text = r#"{"slots": [{"name": "city", "is_categorical": false},
                                 {"name": "stars", "is_categorical": "yes"}]}"#;
        let err = decode_document::<Service>("schema.json", text).unwrap_err();
        match err {
            AgentError::Decode { document, path, .. } => {
                assert_eq!(document, "schema.json");
                assert_eq!(path, "slots[1].is_categorical");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_document::<Service>("/nonexistent/schema.json");
        assert!(matches!(result, Err(AgentError::Io(_))));
    }
}
