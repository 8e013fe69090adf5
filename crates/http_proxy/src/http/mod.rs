pub mod header;
pub mod method;
pub mod parser;
pub mod response;
pub mod uri;

mod version;
pub use version::{HttpVersion, ParseHttpVersionError};
