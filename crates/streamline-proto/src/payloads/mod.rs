//! CBOR-encoded event payloads.
//!
//! Field names use camelCase on the wire to match the server's JSON-era
//! schema (`streamId`, `viewerCount`, ...). Every struct is self-describing
//! CBOR, so unknown extra fields from newer servers are ignored on decode.

pub mod chat;
pub mod session;
pub mod stream;
