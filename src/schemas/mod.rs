use std::fmt;

use serde::{Deserialize, Serialize};

pub(crate) mod exam;
pub(crate) mod issue;
pub(crate) mod progress;
pub(crate) mod submission;

/// Server-assigned identifier; the backend sends either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum EntityId {
    Number(i64),
    Text(String),
}

impl EntityId {
    /// Parses user-supplied input, preferring the numeric form.
    pub(crate) fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(value) => EntityId::Number(value),
            Err(_) => EntityId::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(value) => write!(f, "{value}"),
            EntityId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Number(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_id_accepts_numbers_and_strings() {
        let ids: Vec<EntityId> = serde_json::from_value(json!([7, "a1b2"])).expect("ids");
        assert_eq!(ids, vec![EntityId::Number(7), EntityId::Text("a1b2".to_string())]);
        assert_eq!(serde_json::to_value(&ids).expect("ids json"), json!([7, "a1b2"]));
    }

    #[test]
    fn entity_id_parse_prefers_numbers() {
        assert_eq!(EntityId::parse(" 42 "), EntityId::Number(42));
        assert_eq!(EntityId::parse("att-9"), EntityId::Text("att-9".to_string()));
        assert_eq!(EntityId::parse("att-9").to_string(), "att-9");
    }
}
