pub mod crud_handler;
pub mod health_handler;
pub mod heuristics;
pub mod http_handler;
pub mod metrics_handler;
pub mod resolver;
pub mod routes;
pub mod scenario;
pub mod state_manager;
pub mod synthesis_cache;
pub mod synthesizer;

#[cfg(test)]
mod crud_handler_test;
