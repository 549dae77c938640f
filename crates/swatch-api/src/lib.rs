pub mod error;
pub mod rest;
pub mod traits;

pub use error::RemoteError;
pub use rest::RestStore;
pub use traits::RemoteStore;
