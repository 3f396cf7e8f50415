use thiserror::Error;

pub use segpatch_config::ConfigError;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn missing_patch_file(path: impl Into<String>) -> Error {
        Error(ErrorKind::MissingPatchFile { path: path.into() }.into())
    }

    pub fn corrupt_patch_file(path: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::CorruptPatchFile {
                path: path.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn pack_encode(pack: impl Into<String>, doc_id: crate::DocId) -> Error {
        Error(
            ErrorKind::PackEncode {
                pack: pack.into(),
                doc_id,
            }
            .into(),
        )
    }

    pub fn metadata<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Metadata {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("checksum mismatch for '{element}'")]
    ChecksumMismatch { element: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("patch file '{path}' is listed in segment metadata but does not exist")]
    MissingPatchFile { path: String },

    #[error("corrupt patch file '{path}': {message}")]
    CorruptPatchFile { path: String, message: String },

    #[error("failed to encode patch value of pack attribute '{pack}' for doc {doc_id}")]
    PackEncode { pack: String, doc_id: crate::DocId },

    #[error("patch load requires {required} bytes, budget has {remaining} remaining")]
    BudgetExceeded { required: u64, remaining: u64 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error for '{context}': {source}'")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("metadata error: {context}")]
    Metadata {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        ErrorKind::Config(e).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
