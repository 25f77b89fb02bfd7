//! Covert VFS
//!
//! Moves byte messages between two peers that share nothing but an object
//! store (a directory tree, a synced folder, a cloud drive). Data never
//! travels over a direct connection: it is hidden in the store's objects.
//!
//! # Features
//!
//! - **Checksum steganography**: one byte per object, carried by the CRC-32
//!   of the object's content (tuned by appending filler)
//! - **Metadata side channel**: base64 chunks in per-object properties
//! - **Virtual filesystems**: many peer pairs share one store, each on a
//!   disjoint slice chosen by a global client counter
//! - **Verified batches**: every batch carries a digest; the receiver NACKs
//!   corrupt batches and the sender resends them
//!
//! # Architecture
//!
//! ```text
//! StorageMedium → ChannelAllocator → SignalChannel + Codec → TransportProtocol
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use covert_vfs::storage::DirectoryMedium;
//! use covert_vfs::transport::ChecksumTransport;
//! use covert_vfs::TransportConfig;
//! use std::path::Path;
//!
//! let medium = DirectoryMedium::open(Path::new("./fileshare")).unwrap();
//! let mut transport = ChecksumTransport::checksum(medium, TransportConfig::default()).unwrap();
//!
//! transport.connect().unwrap();
//! transport.write(b"hello from the other side").unwrap();
//! let reply = transport.read().unwrap();
//! ```

pub mod channel;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod transport;

pub use channel::{Channel, Deadline, Signal};
pub use config::TransportConfig;
pub use error::{Error, Result};
pub use transport::{ChecksumTransport, PropertyTransport, TransportProtocol};
