pub mod client;
pub mod routes;
pub mod webhook;

pub use client::*;
pub use routes::*;
