//! Storage handler implementations

mod http;
mod local;
mod memory;
pub mod object_store;
pub mod sigv4;
mod stream;

pub use http::HttpHandler;
pub use local::LocalHandler;
pub use memory::{DocumentHandler, NoIoHandler};
pub use object_store::{ObjectLocation, ObjectStore, ObjectStoreHandler};
pub use sigv4::{AwsCredentials, SigV4Signer};
pub use stream::StreamHandler;
