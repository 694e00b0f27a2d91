/// Shared error type used across all memotic crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("note API: {0}")]
    NoteApi(String),

    #[error("container: {0}")]
    Container(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short marker used when a failure has to be recorded inline
    /// (e.g. in the list of posted comment names).
    pub fn marker(&self) -> String {
        match self {
            Error::Auth(m) => format!("<auth failed: {m}>"),
            Error::NotFound(m) => format!("<parent not found: {m}>"),
            other => format!("<failed: {other}>"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_distinguishes_auth_and_not_found() {
        assert_eq!(Error::Auth("401".into()).marker(), "<auth failed: 401>");
        assert_eq!(
            Error::NotFound("memos/9".into()).marker(),
            "<parent not found: memos/9>"
        );
        assert_eq!(
            Error::Http("connection refused".into()).marker(),
            "<failed: HTTP: connection refused>"
        );
    }
}
