// SPECLINK: https://webidl.spec.whatwg.org/#idl-DOMException
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, thiserror::Error)]
#[error("{name:?}: {message}")]
pub struct DomException {
    pub name: ErrorName,
    pub message: &'static str,
    pub code: u16,
}

impl DomException {
    fn new(name: ErrorName, message: &'static str, code: u16) -> Self {
        Self {
            name,
            message,
            code,
        }
    }
}

impl From<ErrorName> for DomException {
    fn from(value: ErrorName) -> Self {
        match value {
            ErrorName::HierarchyRequestError => DomException::new(
                value,
                "The operation would yield an incorrect node tree.",
                DomException::HIERARCHY_REQUEST_ERR,
            ),
            ErrorName::InvalidCharacterError => DomException::new(
                value,
                "The string contains invalid characters.",
                DomException::INVALID_CHARACTER_ERR,
            ),
            ErrorName::NotFoundError => DomException::new(
                value,
                "The object can not be found here.",
                DomException::NOT_FOUND_ERR,
            ),
        }
    }
}

impl DomException {
    pub const HIERARCHY_REQUEST_ERR: u16 = 3;
    pub const INVALID_CHARACTER_ERR: u16 = 5;
    pub const NOT_FOUND_ERR: u16 = 8;
}

// SPECLINK: https://webidl.spec.whatwg.org/#dfn-error-names-table
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum ErrorName {
    HierarchyRequestError,
    InvalidCharacterError,
    NotFoundError,
}
