//! Gateway: the webhook HTTP server.
//!
//! `POST /callback` receives LINE webhooks (signature checked against the raw body), `GET /` is
//! a plain liveness probe.

mod server;

pub use server::{build_router, run_gateway, GatewayState};
