//! nbforge storage I/O
//!
//! Routes reads, writes and listings to a backend by path scheme. The router
//! holds `(prefix, handler)` pairs, most recently registered first, and falls
//! back to the local filesystem for unprefixed paths.
//!
//! | Prefix | Handler |
//! |---|---|
//! | *(none)* | [`LocalHandler`] |
//! | `s3://`, `minio://` | [`ObjectStoreHandler::s3`] |
//! | `gs://` | [`ObjectStoreHandler::gcs`] (retries rate-limited writes) |
//! | `abs://` | [`ObjectStoreHandler::azure`] |
//! | `http://`, `https://` | [`HttpHandler`] |
//! | `-` | [`StreamHandler`] |

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod retry;
pub mod router;

pub use config::StorageConfig;
pub use error::{IoError, TransportError};
pub use handler::StorageHandler;
pub use handlers::{
    AwsCredentials, DocumentHandler, HttpHandler, LocalHandler, NoIoHandler, ObjectLocation,
    ObjectStore, ObjectStoreHandler, SigV4Signer, StreamHandler,
};
pub use retry::RetryPolicy;
pub use router::{
    parse_yaml, CwdGuard, StorageRouter, StorageTarget, DOCUMENT_EXTENSIONS, LOCAL_SCHEME,
    PARAMETER_FILE_EXTENSIONS, STREAM_MARKER,
};
