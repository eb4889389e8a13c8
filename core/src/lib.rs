pub mod campaign;
pub mod config;
pub mod desk;
pub mod error;
pub mod event;
pub mod proportion_test;
pub mod retention;
pub mod rng;
pub mod roi;
pub mod store;
pub mod synthetic;
pub mod types;
