//! Typed decoding of auction contract logs.
//!
//! Every log handed to the sync layer goes through [`WinnerEvent::try_from`] or
//! [`TipEvent::try_from`]. A [`DecodeError`] is either skippable (the log is not
//! one of ours, or is still pending) or an integrity fault that must fail the
//! whole batch.

mod events;

pub use events::{DecodeError, TipEvent, WinnerEvent};
