use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// What one status endpoint answered.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedResponse<T> {
    Ready(T),
    /// The backend reported an application error in the body.
    Failed(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResponseError {
    /// The body was not JSON.
    Json(String),
    /// JSON, but not the expected payload.
    Shape(String),
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::Json(message) => write!(f, "invalid json: {message}"),
            ResponseError::Shape(message) => write!(f, "unexpected payload: {message}"),
        }
    }
}

impl std::error::Error for ResponseError {}

impl<T: DeserializeOwned> FeedResponse<T> {
    pub fn from_json(body: &str) -> Result<Self, ResponseError> {
        let value: Value =
            serde_json::from_str(body).map_err(|err| ResponseError::Json(err.to_string()))?;
        Self::from_value(value)
    }

    /// A truthy `error` field wins over everything else in the body, so an
    /// error payload never needs the regular fields.
    pub fn from_value(value: Value) -> Result<Self, ResponseError> {
        if let Some(message) = value.get("error").and_then(error_message) {
            return Ok(FeedResponse::Failed(message));
        }
        serde_json::from_value(value)
            .map(FeedResponse::Ready)
            .map_err(|err| ResponseError::Shape(err.to_string()))
    }
}

impl<T> FeedResponse<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            FeedResponse::Ready(value) => Some(value),
            FeedResponse::Failed(_) => None,
        }
    }
}

fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::Number(number) if number.as_f64().map_or(true, |n| n == 0.0 || n.is_nan()) => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        value: u32,
    }

    #[test]
    fn error_field_short_circuits() {
        let parsed = FeedResponse::<Probe>::from_json(r#"{"error":"x"}"#).expect("parse");
        assert_eq!(parsed, FeedResponse::Failed("x".to_string()));

        let parsed = FeedResponse::<Probe>::from_json(r#"{"error":{"code":-28}}"#).expect("parse");
        assert_eq!(parsed, FeedResponse::Failed(r#"{"code":-28}"#.to_string()));
    }

    #[test]
    fn falsy_error_is_ignored() {
        for body in [
            r#"{"value":1,"error":null}"#,
            r#"{"value":1,"error":""}"#,
            r#"{"value":1,"error":false}"#,
            r#"{"value":1,"error":0}"#,
        ] {
            let parsed = FeedResponse::<Probe>::from_json(body).expect("parse");
            assert_eq!(parsed, FeedResponse::Ready(Probe { value: 1 }), "{body}");
        }
    }

    #[test]
    fn bad_bodies_are_errors() {
        assert!(matches!(
            FeedResponse::<Probe>::from_json("<html>"),
            Err(ResponseError::Json(_))
        ));
        assert!(matches!(
            FeedResponse::<Probe>::from_json(r#"{"other":1}"#),
            Err(ResponseError::Shape(_))
        ));
    }
}
