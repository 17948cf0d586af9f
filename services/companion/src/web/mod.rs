pub mod billing;
pub mod learning_task;
pub mod middleware;
pub mod poll_task;
pub mod protocol;
pub mod quiz_task;
pub mod rest;
pub mod state;
pub mod study;
pub mod ws_handler;

#[cfg(test)]
mod test_support;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use middleware::require_auth;
pub use ws_handler::ws_handler;
