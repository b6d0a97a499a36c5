pub mod block;
pub mod multiplexer;
pub mod streamer;
pub mod upstream;
pub mod upstream_http;
pub mod upstream_mem;

pub use streamer::{StreamError, stream};
pub use upstream::{BlockStream, ObjectLocator, ObjectMetadata, UpstreamError, UpstreamStore};
pub use upstream_http::HttpRangeUpstream;
pub use upstream_mem::InMemoryUpstream;
