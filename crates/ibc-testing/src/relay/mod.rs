// Relay operations between two chain agents: proofs, light client
// management and the connection handshake

pub mod client_update;
pub mod handshake;
pub mod proof;
pub mod sync;

pub use client_update::{construct_msg_create_client, construct_msg_update_client};
pub use handshake::{ConnectionHandshake, HandshakeState};
pub use proof::{parse_storage_key, Proof};
