pub mod error;
pub mod frames;
pub mod snapshot;
pub mod time;

pub use error::ProtoError;
pub use frames::{
    ClientFrame, ErrorBody, ErrorCode, EventBody, PresenceAction, RelayedEvent, ServerFrame,
    SyncAction, decode_client_frame, encode_frame,
};
pub use snapshot::{ParticipantIdentity, PlaybackSnapshot};
pub use time::epoch_ms;
