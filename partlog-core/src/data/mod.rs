mod record;
mod request;
mod response;

pub use record::*;
pub use request::*;
pub use response::*;
