pub mod context;
pub mod handler;

pub use context::{empty_body, full_body, BoxBody, RequestContext};
pub use handler::proxy_route;
