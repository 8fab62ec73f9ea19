/// Errors reported by the coordination service and the client surface.
pub mod error;

/// Generic keys client traits and the request/response types they exchange.
pub mod keys;
