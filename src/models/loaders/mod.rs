pub mod jsonl_loader;
pub mod toml_loader;

pub use jsonl_loader::{load_requests_file, parse_requests, RequestLine};
pub use toml_loader::{load_rubric_file, parse_rubric};
