//! Protocol module containing the frame codec, reply codes, and the
//! heartbeat datagram parser.

pub mod frame;
pub mod heartbeat;

/// Upper bound on a single frame, matching the fixed read buffer used on
/// both ends of the wire. A frame larger than this cannot be delivered
/// intact because one transport read yields one frame.
pub const MAX_FRAME_LEN: usize = 8192;
