use thiserror::Error;

/// Programming errors reported by `SharedBox`. Neither kind is meant to be retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("dereferenced a shared box that holds no value")]
    NullDereference,

    #[error("invalid argument: {context}")]
    InvalidArgument { context : &'static str },
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    #[cold]
    pub fn null_dereference() -> Self {
        Error::NullDereference
    }

    #[cold]
    pub fn invalid_argument(context : &'static str) -> Self {
        Error::InvalidArgument { context }
    }
}
