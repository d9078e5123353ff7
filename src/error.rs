/// Failures a chat command can end in. Each one turns into exactly one reply.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0} not found.")]
    NotFound(String),

    #[error("the playlist is empty")]
    EmptyPlaylist,

    #[error("usage: {usage}")]
    InvalidCommandUsage { usage: String },

    #[error("remote service error: {0:#}")]
    RemoteService(#[source] anyhow::Error),
}

impl RelayError {
    pub fn remote(err: anyhow::Error) -> Self {
        RelayError::RemoteService(err)
    }

    /// Text sent back to the channel. Remote failures stay generic; the cause is only logged.
    pub fn reply_text(&self) -> String {
        match self {
            RelayError::NotFound(name) => format!("{} not found.", name),
            RelayError::EmptyPlaylist => "The playlist is empty.".to_string(),
            RelayError::InvalidCommandUsage { usage } => format!("Usage: {}", usage),
            RelayError::RemoteService(_) => {
                "Something went wrong talking to Spotify, please try again later.".to_string()
            }
        }
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
