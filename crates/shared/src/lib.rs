pub mod catalog;
pub mod compiler;
pub mod domain;
pub mod error;
pub mod protocol;
