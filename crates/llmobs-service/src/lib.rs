//! Library half of `llmobs-service`, split out so integration tests can
//! build a router without spawning the binary, the way
//! `sem_os_server::router::build_router` is exercised directly in its
//! HTTP integration tests.

pub mod config;
pub mod routes;
pub mod state;
