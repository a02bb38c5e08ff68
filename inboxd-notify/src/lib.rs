//! Journal storage, cross-session poke bus, and the live SSE endpoint.

pub mod journal;
pub mod sink;
pub mod sse;

pub use journal::Notify;
