pub mod auth;
pub mod chat_handler;
pub mod health_handler;
pub mod index_handler;
pub mod search_handler;
pub mod sse_handler;

pub use auth::AuthenticatedUser;
pub use chat_handler::ChatHandler;
pub use health_handler::HealthHandler;
pub use index_handler::IndexHandler;
pub use search_handler::SearchHandler;
