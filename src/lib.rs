//! Livechat: a client for a YouTube live chat feed.
//!
//! Polls the active broadcast's chat on the server-suggested interval and
//! posts outbound messages to it. The [`engine::ChatEngine`] owns the
//! connection lifecycle; everything else plugs into it through traits.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod engine;
pub mod feed;
pub mod youtube;
