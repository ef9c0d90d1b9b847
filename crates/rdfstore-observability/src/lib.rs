mod request;
mod transaction;

pub use request::*;
pub use transaction::*;
