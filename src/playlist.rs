pub mod fetch;
pub mod id;
pub mod parser;
pub mod structs;

pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use parser::parse_playlist;
pub use structs::{Channel, PlaylistSnapshot};
