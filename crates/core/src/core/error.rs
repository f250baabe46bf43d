use thiserror::Error;

/// Everything that can go wrong while mounting or unmounting the app.
///
/// Errors are cloned into every [`crate::loader::Settled`] future waiting on
/// an instance, so variants carry owned strings rather than sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("container id must not be empty")]
    EmptyContainerId,

    #[error("container `{0}` already has a mount in progress or active")]
    AlreadyMounted(String),

    #[error("invalid loader config: {0}")]
    Config(String),

    #[error("script `{src}` failed to load: {reason}")]
    ScriptLoad { src: String, reason: String },

    #[error("no render function is available on the page")]
    RendererMissing,

    #[error("container `{0}` was not found at render time")]
    ContainerMissing(String),

    #[error("mount was torn down before the script loaded")]
    Aborted,

    #[error("host page: {0}")]
    Host(String),
}

impl MountError {
    pub fn host(msg: impl Into<String>) -> Self {
        MountError::Host(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MountError>;
