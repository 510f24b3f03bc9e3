use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("xpath parse error in '{expr}': {detail}")]
    Parse { expr: String, detail: String },

    #[error("unknown xpath function '{0}'")]
    UnknownFunction(String),

    #[error("xpath function '{name}': {message}")]
    Function { name: String, message: String },

    #[error("xpath type error: {0}")]
    Type(String),
}

impl XPathError {
    pub fn type_error(message: impl Into<String>) -> Self {
        XPathError::Type(message.into())
    }
}
