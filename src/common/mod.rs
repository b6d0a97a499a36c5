pub mod error;
pub mod http;
pub mod logger;
pub mod types;

pub use error::*;
pub use http::*;
pub use logger::*;
pub use types::*;
