//! Sign-in, session cookies and the extractors that resolve a caller's tenant and role.

pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod session;
