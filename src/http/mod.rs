pub mod request;
pub mod response;
pub mod wire;

pub use request::{Method, Request};
pub use response::{reason_phrase, Response};
pub use wire::{Limits, WireError};
