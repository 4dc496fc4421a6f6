pub mod agreement;
pub mod validate;

pub use agreement::*;
pub use validate::*;
