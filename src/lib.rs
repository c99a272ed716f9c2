pub mod checkpoint;
pub mod config;
pub mod error;
pub mod poller;

pub mod kafka;
pub mod postgres;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};
pub use poller::{Poller, RecordSink};
