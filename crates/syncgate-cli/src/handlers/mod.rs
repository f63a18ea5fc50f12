//! Storage API request handlers

pub mod object;
pub mod presign;
pub mod service;
pub mod subscribe;

pub use object::*;
pub use presign::*;
pub use service::*;
pub use subscribe::*;
