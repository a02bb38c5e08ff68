//! In-memory atomic document store.
//!
//! Stands in for the real persistence backend: any store supporting atomic
//! single-document updates with a returned post-image is a drop-in
//! replacement. [`doc::AtomicDoc`] and [`doc::Collection`] are that
//! contract; [`blob::AttachmentStore`] and [`counter::CounterService`] are
//! the two specialized stores built on top of it.

pub mod blob;
pub mod counter;
pub mod doc;
pub mod error;
pub mod ident;

pub use doc::{AtomicDoc, Collection};
pub use error::StoreError;
pub use ident::{gen_ident, UniqueIdent};
