//! Core data model types: mailboxes, message projections, addresses.

pub mod address;
pub mod email;
pub mod mailbox;
