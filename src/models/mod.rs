// src/models/mod.rs
pub mod driver;
pub mod history;
pub mod ride;
pub mod user;

pub use driver::*;
pub use history::*;
pub use ride::*;
pub use user::*;
