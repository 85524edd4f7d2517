pub mod error;
pub mod brainfuck;
pub mod png;
pub mod dialect;
pub mod program;

pub use error::{Error, Result};
