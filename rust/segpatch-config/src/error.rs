use thiserror::Error;

/// Schema validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate attribute name '{0}'")]
    DuplicateAttributeName(String),

    #[error("duplicate pack attribute name '{0}'")]
    DuplicatePackName(String),

    #[error("pack attribute '{0}' has no sub attributes")]
    EmptyPackAttribute(String),

    #[error("pack attribute '{pack}' refers to unknown attribute '{attribute}'")]
    UnknownPackMember { pack: String, attribute: String },

    #[error("attribute '{attribute}' is a member of both '{first}' and '{second}'")]
    AttributeInMultiplePacks {
        attribute: String,
        first: String,
        second: String,
    },

    #[error("invalid compress type '{compress}' for pack attribute '{pack}'")]
    InvalidCompressType { pack: String, compress: String },

    #[error("invalid schema json: {0}")]
    Json(#[from] serde_json::Error),
}
