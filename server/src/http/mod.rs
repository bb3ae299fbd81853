mod error;
mod handlers;
mod server;
mod state;


pub use error::{ApiError, ApiResult};
pub use server::{router, serve, start_server};
pub use state::AppState;
