//! External delivery channels for alerts.
//!
//! Each transport makes exactly one attempt per call. The monitor re-checks
//! its conditions on a fixed cadence, so a lost alert is re-raised by the
//! next cycle rather than retried here.

pub mod email;
pub mod webhook;
