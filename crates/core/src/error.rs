/// Result alias that carries the custom [`CarouselError`] type.
pub type Result<T> = std::result::Result<T, CarouselError>;

/// Common error type for the core crate.
///
/// The first three variants form the failure taxonomy of the session
/// lifecycle: content fetch failures are recovered locally by the
/// controller, load and playback-permission failures are reported to the
/// caller of [`crate::AudioSession::start`] and recovered there.
#[derive(Debug, thiserror::Error)]
pub enum CarouselError {
    /// The media resource failed to become ready for playback.
    #[error("failed to load media resource `{url}`: {reason}")]
    Load { url: String, reason: String },
    /// Playback start was rejected, typically because no user gesture has
    /// unlocked the playback context yet.
    #[error("playback start rejected for `{url}`: {reason}")]
    PlaybackPermission { url: String, reason: String },
    /// A content fragment could not be fetched. Non-fatal; the controller
    /// degrades to placeholder content.
    #[error("failed to fetch content fragment `{url}`: {reason}")]
    ContentFetch { url: String, reason: String },
    /// A `start` call was overtaken by a newer `start` or `stop` before it
    /// could install its handle. The overtaken call has already released
    /// everything it allocated.
    #[error("session start for `{0}` was superseded before completion")]
    Superseded(String),
    /// A caller handed the core data it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Readable message for conditions without a dedicated variant, such as
    /// a poisoned internal lock.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around FFT processing errors from the analyser.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl CarouselError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Builds a [`CarouselError::Load`] for the given resource.
    pub fn load(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`CarouselError::PlaybackPermission`] for the given resource.
    pub fn permission(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlaybackPermission {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`CarouselError::ContentFetch`] for the given fragment.
    pub fn content_fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContentFetch {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for CarouselError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CarouselError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
