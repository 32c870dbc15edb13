//! Pure domain rules shared between server and client tooling.

pub mod credentials;
