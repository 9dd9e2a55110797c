//! Domain models shared across crates

pub mod member;

pub use member::{Member, NewMember, Role};
