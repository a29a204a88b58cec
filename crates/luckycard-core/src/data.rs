//! Participant records as stored by the online task (camelCase keys).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;

/// Per-participant task responses; every field is one entry per trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResponses {
    #[serde(rename = "randomPick")]
    pub random_pick: Vec<Value>,
    #[serde(rename = "randomPickColour")]
    pub random_pick_colour: Vec<Value>,
    #[serde(rename = "reportColour")]
    pub report_colour: Vec<Value>,
    #[serde(rename = "RTreport")]
    pub rt_report: Vec<f64>,
    #[serde(rename = "honestyRating")]
    pub honesty_rating: Vec<f64>,
    #[serde(rename = "RThonesty")]
    pub rt_honesty: Vec<f64>,
    pub results: Vec<Value>,
    #[serde(rename = "catchRating")]
    pub catch_rating: Vec<f64>,
    #[serde(rename = "RTcatch")]
    pub rt_catch: Vec<f64>,
}

impl GameResponses {
    const FIELDS: [&'static str; 9] = [
        "randomPick",
        "randomPickColour",
        "reportColour",
        "RTreport",
        "honestyRating",
        "RThonesty",
        "results",
        "catchRating",
        "RTcatch",
    ];

    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        from_record("game responses", &Self::FIELDS, value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Demographics survey answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Value,
    pub catch: Value,
    pub edlev: Value,
    pub gender: Value,
    pub twin: Value,
}

impl Demographics {
    const FIELDS: [&'static str; 5] = ["age", "catch", "edlev", "gender", "twin"];

    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        from_record("demographics", &Self::FIELDS, value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn from_record<T: DeserializeOwned>(
    record: &'static str,
    fields: &[&'static str],
    value: &Value,
) -> Result<T, ModelError> {
    let object: &Map<String, Value> = value.as_object().ok_or_else(|| ModelError::InvalidField {
        field: record.to_string(),
        message: "expected a JSON object".to_string(),
    })?;
    if let Some(field) = fields.iter().copied().find(|field| !object.contains_key(*field)) {
        return Err(ModelError::MissingField { record, field });
    }
    serde_json::from_value(value.clone()).map_err(|err| ModelError::InvalidField {
        field: record.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn responses_json() -> Value {
        json!({
            "randomPick": [3, 1],
            "randomPickColour": ["red", "blue"],
            "reportColour": [-1, 1],
            "RTreport": [950.0, 720.5],
            "honestyRating": [4, 2],
            "RThonesty": [1200.0, 880.0],
            "results": ["tie", "win"],
            "catchRating": [],
            "RTcatch": []
        })
    }

    #[test]
    fn parses_firestore_shaped_record() {
        let responses = GameResponses::from_value(&responses_json()).unwrap();
        assert_eq!(responses.honesty_rating, vec![4.0, 2.0]);
        assert_eq!(responses.rt_honesty[1], 880.0);
        let back = responses.to_value();
        assert_eq!(back["RThonesty"], json!([1200.0, 880.0]));
        assert!(back.get("rt_honesty").is_none());
    }

    #[test]
    fn missing_field_fails_fast() {
        let mut value = responses_json();
        value.as_object_mut().unwrap().remove("honestyRating");
        let err = GameResponses::from_value(&value).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingField {
                record: "game responses",
                field: "honestyRating"
            }
        );
    }

    #[test]
    fn demographics_roundtrip() {
        let value = json!({"age": 31, "catch": 1, "edlev": "msc", "gender": "f", "twin": false});
        let demos = Demographics::from_value(&value).unwrap();
        assert_eq!(demos.to_value(), value);
        let err = Demographics::from_value(&json!({"age": 31})).unwrap_err();
        assert!(matches!(err, ModelError::MissingField { field: "catch", .. }));
    }
}
