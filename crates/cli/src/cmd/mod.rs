mod export;
mod query;
mod status;

pub use export::cmd_export;
pub use query::{cmd_query, QueryArgs};
pub use status::cmd_status;
