use thiserror::Error;

/// What can go wrong inside one call to the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("URL is not supported by the extractor")]
    UnsupportedUrl,

    #[error("platform requires authentication")]
    AuthRequired,

    #[error("platform is rate limiting requests")]
    RateLimited,

    #[error("media not found")]
    NotFound,

    #[error("extraction failed: {0}")]
    Unknown(String),
}

impl ExtractionError {
    /// Classify collaborator stderr into a failure kind.
    pub fn classify(message: &str) -> Self {
        let text = message.to_lowercase();

        if text.contains("unsupported url") {
            return ExtractionError::UnsupportedUrl;
        }

        const AUTH: [&str; 7] = [
            "sign in",
            "login required",
            "log in",
            "cookies",
            "private",
            "confirm your age",
            "authentication",
        ];
        if AUTH.iter().any(|needle| text.contains(needle)) {
            return ExtractionError::AuthRequired;
        }

        if text.contains("429") || text.contains("too many requests") || text.contains("rate-limit")
        {
            return ExtractionError::RateLimited;
        }

        const MISSING: [&str; 5] = ["404", "not found", "unavailable", "does not exist", "removed"];
        if MISSING.iter().any(|needle| text.contains(needle)) {
            return ExtractionError::NotFound;
        }

        ExtractionError::Unknown(message.trim().to_string())
    }
}

/// Request-level failures, each carrying one user-facing message.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Enter a valid URL from: {0}.")]
    UnsupportedPlatform(String),

    #[error("This media requires login. The server has no valid cookies for it.")]
    AuthRequired,

    #[error("The platform is rate limiting requests. Try again in a few minutes.")]
    RateLimited,

    #[error("Media not found. Check that the link is correct and public.")]
    NotFound,

    #[error("No downloadable media was found at this URL.")]
    NoDownloadableMedia,

    #[error("Index must be between 1 and {count}.")]
    ItemNotFound { index: usize, count: usize },

    #[error("Selected format is not available for this media item.")]
    FormatNotFound(String),

    #[error("This quality needs audio/video merging, which is not available on this server.")]
    MergeUnavailable,

    #[error("Could not read media information from this URL.")]
    UnknownExtractionFailure(String),

    #[error("The download failed while streaming. Try again.")]
    StreamFailure(String),
}

impl MediaError {
    /// Collaborator diagnostic meant for operators, never for end users.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            MediaError::UnknownExtractionFailure(detail) | MediaError::StreamFailure(detail) => {
                Some(detail)
            }
            _ => None,
        }
    }
}

impl From<ExtractionError> for MediaError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::UnsupportedUrl => {
                MediaError::UnsupportedPlatform(super::platform::supported_names())
            }
            ExtractionError::AuthRequired => MediaError::AuthRequired,
            ExtractionError::RateLimited => MediaError::RateLimited,
            ExtractionError::NotFound => MediaError::NotFound,
            ExtractionError::Unknown(detail) => MediaError::UnknownExtractionFailure(detail),
        }
    }
}
