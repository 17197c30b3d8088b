//! HTTP surface over a shared [`FlowExplorer`](crate::explorer::FlowExplorer).
//!
//! Every handler runs the synchronous explorer on the blocking pool. Bad
//! parameters answer 400, store failures 502 with the cause, and an empty
//! but successful query answers 200 with an empty list.

pub mod routes;
pub mod types;
pub mod web_server;

#[cfg(test)]
mod tests;

pub use routes::routes;
pub use web_server::WebServer;

use log::{error, warn};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

use crate::error_handling::types::{ExportError, FilterError, QueryError};

/// API error payload
#[derive(Serialize)]
pub struct ApiError {
    pub message: String,
}

/// Payload of a failed store query
#[derive(Serialize)]
pub struct StoreFailure {
    pub message: String,
    pub cause: String,
}

/// Reasons a handler gives up before producing its body.
#[derive(Debug)]
pub enum ApiFailure {
    BadRequest(FilterError),
    Query(QueryError),
    Export(ExportError),
}

impl From<FilterError> for ApiFailure {
    fn from(err: FilterError) -> Self {
        ApiFailure::BadRequest(err)
    }
}

impl From<QueryError> for ApiFailure {
    fn from(err: QueryError) -> Self {
        ApiFailure::Query(err)
    }
}

impl From<ExportError> for ApiFailure {
    fn from(err: ExportError) -> Self {
        ApiFailure::Export(err)
    }
}

impl ApiFailure {
    pub fn into_response(self) -> Response {
        match self {
            ApiFailure::BadRequest(e) => {
                warn!("Rejected request: {}", e);
                error_reply(StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiFailure::Query(e) => {
                error!("Store query failed: {}", e);
                reply::with_status(
                    reply::json(&StoreFailure {
                        message: "Store query failed".to_string(),
                        cause: e.to_string(),
                    }),
                    StatusCode::BAD_GATEWAY,
                )
                .into_response()
            }
            ApiFailure::Export(e) => {
                error!("Export failed: {}", e);
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

pub fn error_reply(status: StatusCode, message: String) -> Response {
    reply::with_status(reply::json(&ApiError { message }), status).into_response()
}

/// Runs a handler on the blocking pool and flattens its outcome into a response.
pub async fn run_blocking<F>(handler: F) -> Response
where
    F: FnOnce() -> Result<Response, ApiFailure> + Send + 'static,
{
    match tokio::task::spawn_blocking(handler).await {
        Ok(Ok(response)) => response,
        Ok(Err(failure)) => failure.into_response(),
        Err(e) => {
            error!("Request handler did not complete: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Request handler failed".to_string())
        }
    }
}
