pub mod agreement;
pub mod annotation;
pub mod common;
pub mod crawler;
pub mod dataset;
pub mod recommendation;
pub mod result;
pub mod vocabulary;

pub use agreement::*;
pub use annotation::*;
pub use common::*;
pub use crawler::*;
pub use dataset::*;
pub use recommendation::*;
pub use result::*;
pub use vocabulary::*;
