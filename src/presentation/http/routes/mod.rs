pub mod chat_routes;
pub mod health_routes;
pub mod index_routes;
pub mod search_routes;

pub use chat_routes::*;
pub use health_routes::*;
pub use index_routes::*;
pub use search_routes::*;
