pub mod headless;
pub mod request;
pub mod throttle;
pub mod transport;

pub use request::{generate_request, make_header_request, make_param_request, Action, ScanRequest};
pub use throttle::RateLimiter;
pub use transport::{send_request, Exchange, HttpTransport, RawResponse, Transport};
