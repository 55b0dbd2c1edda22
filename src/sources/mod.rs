pub mod http;
pub mod registry;
pub mod traits;
pub mod types;

pub use http::HttpListingAdapter;
pub use registry::ListingSources;
pub use traits::{SourceAdapter, SourceError};
pub use types::SearchCriteria;
