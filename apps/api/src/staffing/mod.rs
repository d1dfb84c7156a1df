//! People the company staffs: employee HR records, bookable resources, their
//! documents and their allocations to projects.

pub mod allocations;
pub mod documents;
pub mod employees;
pub mod handlers;
pub mod load;
pub mod resources;
