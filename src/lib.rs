#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

//! iAro: a Spanish-speaking chat assistant core.
//!
//! The crate is split between an in-memory conversation core (per-user
//! sessions, bounded history, transient media lifecycle) and the boundary
//! clients that feed it: the Gemini model provider, Deepgram transcription,
//! web search, and channel transports.

pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod media;
pub mod providers;
pub mod search;
pub mod sessions;
pub mod transcription;

pub use config::Config;
pub use error::{IaroError, Result};
pub use sessions::SessionManager;
