pub mod params;
pub mod session;

pub use params::{bind_named, BoundStatement};
pub use session::PgSession;
