//! The resource envelope every successful handler returns.
//!
//! ```json
//! { "status": "success", "requestedTime": "...", "result": 3, "data": { "Data": [...] } }
//! ```
//!
//! `requestedTime` and `result` are omitted when not set.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Payload<T: Serialize> {
    #[serde(rename = "Data")]
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<usize>,
    pub data: Payload<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            requested_time: None,
            result: None,
            data: Payload { data },
        }
    }

    pub fn requested_at(mut self, requested_time: impl Into<String>) -> Self {
        self.requested_time = Some(requested_time.into());
        self
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    /// A list envelope; `result` is the number of items.
    pub fn list(items: Vec<T>) -> Self {
        let count = items.len();
        Self {
            result: Some(count),
            ..Self::success(items)
        }
    }
}

/// Body of the auth endpoints: the envelope plus the issued token.
#[derive(Debug, Serialize)]
pub struct TokenEnvelope<T: Serialize> {
    pub status: &'static str,
    pub token: String,
    pub data: Payload<T>,
}

impl<T: Serialize> TokenEnvelope<T> {
    pub fn new(token: String, data: T) -> Self {
        Self {
            status: "success",
            token,
            data: Payload { data },
        }
    }
}
