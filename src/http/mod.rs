//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, gateway endpoints)
//!     → request.rs (default parse, request ID) or plugin request parser
//!     → routing::Router::handle_request (blocking pool)
//!     → response.rs (HttpResponse → Axum response)
//!     → Send to client
//! ```

pub mod codec;
pub mod request;
pub mod response;
pub mod server;

pub use codec::{Codec, JsonCodec};
pub use request::{HttpRequest, UuidRequestId, X_REQUEST_ID};
pub use response::{HttpResponse, Reply};
pub use server::HttpServer;
