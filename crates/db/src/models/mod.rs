//! Row types returned by the repositories.

pub mod warehouse;
