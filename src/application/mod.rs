// Application layer: the transfer engine and the boundary service that
// validates requests before handing them to it.

pub mod engine;
pub mod error;
pub mod service;

pub use engine::*;
pub use error::*;
pub use service::*;
