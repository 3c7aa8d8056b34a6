//! Wire envelopes and encodings for the four OrderNet peer protocols.
//!
//! Every wire format is canonical UTF-8 JSON with a fixed field order
//! (struct declaration order) and byte fields encoded as arrays of
//! integers. Signing always happens over the canonical JSON bytes of a
//! dedicated payload struct, never over an ad-hoc string.
//!
//! Modules:
//!
//! - [`chat`] — encrypted channel messages (gossip).
//! - [`presence`] — signed presence announcements (gossip).
//! - [`vouch`] — join requests and vouches (unicast).
//! - [`keyex`] — per-recipient group-key delivery (unicast).
//! - [`invite`] — out-of-band invite codes.
//! - [`topics`] — topic names and unicast protocol ids.

pub mod chat;
pub mod invite;
pub mod keyex;
pub mod presence;
pub mod topics;
pub mod vouch;
