//! Companies, their members and the invitations that bring new members in.

pub mod companies;
pub mod handlers;
pub mod invitations;
pub mod users;
