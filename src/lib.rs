//! Provisioning of Google Cloud external HTTP(S) load balancers as callable
//! actions, with reverse-order rollback when a step fails partway.

pub mod actions;
pub mod clients;
pub mod config;
pub mod definition;
pub mod loadbalancer;
pub mod operation;
pub mod orchestrator;
pub mod params;
pub mod resource;
pub mod rollback;
pub mod server;
