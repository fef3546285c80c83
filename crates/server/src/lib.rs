pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sse;
pub mod state;

pub use config::*;
pub use error::*;
pub use server::*;
pub use state::*;
