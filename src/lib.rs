pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod request_id;
pub mod services;
