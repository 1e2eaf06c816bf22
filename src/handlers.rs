pub mod audit;
pub mod auth;
pub mod fleet;
pub mod operations;
pub mod operators;
pub mod rbac;
pub mod users;
