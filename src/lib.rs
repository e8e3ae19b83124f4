pub mod codec;
pub mod command;
pub mod connection;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod pool;
pub mod transaction;

pub use command::{Arg, Command};
pub use connection::{Config, Connection};
pub use error::Error;
pub use frame::Frame;
pub use pool::Pool;

pub type Result<T> = std::result::Result<T, Error>;
