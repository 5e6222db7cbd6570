mod shared_box;
pub use crate::shared_box::*;

pub mod destructor;
pub use crate::destructor::*;

pub mod error;
pub use crate::error::{Error, Result};
