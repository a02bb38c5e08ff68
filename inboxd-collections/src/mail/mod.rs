pub mod duplicate;
pub mod flags;
pub mod handler;
pub mod registry;
pub mod sink;
pub mod thread_resolver;

pub use flags::FlagUpdates;
pub use handler::{
    add, copy_messages, del, move_messages, update, AddRequest, AddResult, AddStatus, CopyRequest, CopyResult,
    DelRequest, MoveRequest, MoveResult, UpdateRequest, UpdateResult, BULK_BATCH_SIZE,
};
pub use registry::{bump, create_mailbox, delete_mailbox, reserve_slot, set_subscribed, SlotReservation};
pub use sink::{NotifySink, NullSink, SessionSink};
pub use thread_resolver::{compute_reference_set, resolve_thread};
