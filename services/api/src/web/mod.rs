pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary wires into its router.
pub use middleware::require_auth;
pub use rest::me_handler;
pub use ws_handler::ws_handler;
