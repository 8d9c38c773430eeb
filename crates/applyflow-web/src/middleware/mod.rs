pub mod rate_limit;
pub mod request_path;
pub mod security_headers;
