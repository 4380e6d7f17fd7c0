#![forbid(unsafe_code)]

pub mod local;
pub mod remote;
pub mod repository;
pub mod session;
pub mod sqlite;
pub mod wire;

pub use repository::{Backend, KeyValueStore, ProgressStore, Storage, StorageError};
pub use session::{AccessToken, SessionAuth};
