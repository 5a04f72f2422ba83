//! Shared response envelope types for API handlers.
//!
//! Upload acknowledgements use the `{ "data": ... }` envelope. The deletion
//! endpoints answer with their own `{ "success": ... }` shape.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
