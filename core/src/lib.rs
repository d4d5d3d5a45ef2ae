pub mod catalog;
pub mod db;
pub mod error;
pub mod grocery;
pub mod mapping;
pub mod models;
pub mod reconcile;
pub mod request;
pub mod service;
pub mod transport;
