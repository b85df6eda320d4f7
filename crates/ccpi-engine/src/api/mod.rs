//! Read-only HTTP API over the snapshot store.
//!
//! ## Routes
//!
//! - `GET /health` - liveness plus age of the latest snapshot
//! - `GET /api/v1/ccpi` - latest full snapshot
//! - `GET /api/v1/ccpi/history` - compact history points
//! - `GET /api/v1/ccpi/indicators/:id` - one resolved indicator

pub mod handlers;
pub mod routes;

pub use handlers::CcpiApiState;
pub use routes::create_router;
