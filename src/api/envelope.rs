use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConsoleError, Result};

/// Standard response envelope returned by every console REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, mapping an unsuccessful envelope to an error.
    pub fn into_data(self) -> Result<T> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "request failed".to_string());
            return Err(ConsoleError::Api(reason));
        }
        self.data
            .ok_or_else(|| ConsoleError::Api("successful envelope carried no data".to_string()))
    }
}

/// Payload shape for paginated list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedData<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}
