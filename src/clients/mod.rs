pub mod client;
pub mod fake;
pub mod rest;
