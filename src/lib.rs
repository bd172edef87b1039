// phrase-gateway: metered proxy in front of a text generation API.
//
// Anonymous callers get a small lifetime allowance keyed by IP. Callers who
// log in with the shared access password receive a session token and a
// larger daily allowance keyed by that token. Premium counters are cleared
// at local midnight; free counters live as long as the process.

pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod phrases;
pub mod quota;
pub mod reset;
pub mod session;
pub mod state;
pub mod upstream;

pub use error::AppError;
pub use handlers::router;
pub use state::AppState;
