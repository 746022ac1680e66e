/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 * - SQLSTATE で「入力が悪い」と「store が落ちている」を分ける
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    /// The store rejected the data itself. Retrying the same input will fail again.
    #[error("{0}")]
    Invalid(&'static str),
    #[error("db error")]
    Db(#[source] sqlx::Error),
}

impl RepoError {
    /// Integrity (class 23) and data (class 22) errors carry meaning for callers;
    /// everything else stays an opaque db failure.
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(dbe) = &e
            && let Some(code) = dbe.code()
            && let Some(classified) = classify_sqlstate(&code)
        {
            return classified;
        }
        RepoError::Db(e)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Db(_))
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        Self::from_sqlx(e)
    }
}

// Messages are fixed strings so raw database text never reaches a response body.
fn classify_sqlstate(code: &str) -> Option<RepoError> {
    let err = match code {
        "23505" => RepoError::Conflict,
        "23502" => RepoError::Invalid("a required value is missing"),
        "22001" => RepoError::Invalid("value too long"),
        c if c.starts_with("23") => RepoError::Invalid("constraint violation"),
        c if c.starts_with("22") => RepoError::Invalid("invalid value"),
        _ => return None,
    };
    Some(err)
}

pub type RepoResult<T> = Result<T, RepoError>;
