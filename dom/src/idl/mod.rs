pub mod dom_exception;

pub use dom_exception::*;

// SPECLINK: https://webidl.spec.whatwg.org/#idl-exceptions
/// Everything a DOM operation can throw back at its caller.
#[derive(PartialEq, Eq, Debug, Clone, thiserror::Error)]
pub enum Exception {
    #[error("TypeError: {0}")]
    TypeError(&'static str),
    #[error(transparent)]
    DomException(#[from] DomException),
}

impl From<ErrorName> for Exception {
    fn from(value: ErrorName) -> Self {
        Exception::DomException(value.into())
    }
}

impl Exception {
    /// The name of the thrown error, as a script would see it.
    pub fn name(&self) -> String {
        match self {
            Exception::TypeError(_) => "TypeError".to_string(),
            Exception::DomException(exception) => format!("{:?}", exception.name),
        }
    }
}
