//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures shared with the browser client
//!
//! # API Structure
//!
//! - `POST /api/analyze`: upload a lease contract and receive a risk assessment
//! - `GET /api/health`: liveness plus whether the model credential is configured
//!
//! All endpoints are documented with `utoipa`; the generated document is served at `/api/docs`.

pub mod handlers;
pub mod models;
