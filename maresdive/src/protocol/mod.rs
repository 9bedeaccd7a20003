//! Framed command/response protocol spoken by the Icon HD family.
//!
//! Every transaction follows the same shape, regardless of command:
//!
//! ```text
//! host:   +--------+            +----------------+
//!         | opcode |            |    payload     |
//!         +--------+            +----------------+
//!         | 2 bytes|            |  0..n bytes    |
//!         +--------+            +----------------+
//! device:           +-----+                       +----------+-----+
//!                   | ACK |                       | response | END |
//!                   +-----+                       +----------+-----+
//!                   | 0xAA|                       | n bytes  | 0xEA|
//!                   +-----+                       +----------+-----+
//! ```
//!
//! The two sentinel bytes are the only integrity check the protocol offers;
//! a corrupted exchange is discarded wholesale and reissued after purging
//! stale input.

pub(crate) mod link;

/// Acknowledgement byte opening every device response.
pub const ACK: u8 = 0xAA;

/// Terminator byte closing every device response.
pub const END: u8 = 0xEA;

/// Identification ("version") command opcode.
pub const CMD_VERSION: [u8; 2] = [0xC2, 0x67];

/// Addressed memory read command opcode.
pub const CMD_READ: [u8; 2] = [0xE7, 0x42];

/// Additional attempts after a corrupted exchange.
pub const MAX_RETRIES: u32 = 4;

/// Payload ceiling of one wire packet on packetized transports.
pub const WIRE_PACKET_SIZE: usize = 20;
