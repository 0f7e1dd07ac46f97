//! Per-asset pipeline stages and the scheduler that drives them.
//!
//! - **validate**: type and size checks before any decoding
//! - **decode**: content-sniffed decoding on the blocking pool
//! - **metadata**: best-effort EXIF capture data
//! - **analyze**: decides the output encoding
//! - **transform**: orientation, bounded resize, encode
//! - **upload**: object naming and timed store writes
//! - **scheduler**: group-bounded concurrent execution with progress
//! - **aggregate**: batch result and metadata persistence
//! - **discovery**: finds local files to ingest
//! - **hash**: content hashing

pub mod aggregate;
pub mod analyze;
pub mod decode;
pub mod discovery;
pub mod hash;
pub mod metadata;
pub mod scheduler;
pub mod transform;
pub mod upload;
pub mod validate;

pub use aggregate::BatchResultAggregator;
pub use analyze::{AnalyzedAsset, FormatAnalyzer};
pub use decode::{DecodedImage, ImageDecoder, SourceFormat};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use hash::Hasher;
pub use metadata::MetadataExtractor;
pub use scheduler::ConcurrentUploadScheduler;
pub use transform::ImageTransformer;
pub use upload::{ObjectStoreUploader, StoredObject};
pub use validate::Validator;
