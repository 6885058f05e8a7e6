//! Error types shared by engine implementations and task code.

/// Errors raised at the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine failed to launch or to execute a command.
    #[error("engine error: {0}")]
    Engine(String),

    /// A command name could not be resolved to a primitive command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

impl Error {
    /// Convenience constructor for engine failures.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }
}

/// Result alias using the shared [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
