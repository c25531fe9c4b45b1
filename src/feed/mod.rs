//! Market-data feed: payload codec, connection state machine, transport
//! seam and the streaming connection manager.

pub mod codec;
pub mod manager;
pub mod session;
pub mod transport;

pub use codec::{decode_snapshot, DecodeError};
pub use manager::{StopHandle, StreamConnectionManager};
pub use session::{
    ConnectionSession, ConnectionState, SessionMetrics, TransitionError, TransitionReason,
};
pub use transport::{FeedConnector, FeedStream, WsConnector, WsFeedStream};
