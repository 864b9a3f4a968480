#[macro_use]
mod macros;

pub mod catalog;
pub mod detail_cache;
pub mod favorites;
pub mod intent;
pub mod pipeline;
pub mod poster_validator;
pub mod providers;
pub mod session;
