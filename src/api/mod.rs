pub mod annotation_handlers;
pub mod crawler_handlers;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;

pub use error::*;
pub use extract::*;
pub use handlers::*;
pub use routes::*;
