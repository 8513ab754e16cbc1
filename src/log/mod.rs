//! Session log framing: record headers, the type table and the framer.

pub mod frame;
pub mod record;
pub mod stream;

pub use frame::{encode_frame, encode_frame_with_flags, MetaFlags, MIN_META_LEN};
pub use record::{type_name, EventType, Record};
pub use stream::{RecordStream, Records, StreamStop};
