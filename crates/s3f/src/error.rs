use aws_sdk_s3::error::SdkError;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("missing environment variable `{0}`")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("provider api request failed")]
    Http(#[from] reqwest::Error),

    #[error("provider api responded with {status}: {body}")]
    Api { status: u16, body: String },

    #[error("objects user {0} was created without keys")]
    MissingKeys(String),

    #[error("storage request failed")]
    S3(#[source] Box<aws_sdk_s3::Error>),

    #[error("storage request rejected: {code}: {message}")]
    Rejected { code: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl<E, R> From<SdkError<E, R>> for Error
where
    aws_sdk_s3::Error: From<SdkError<E, R>>,
{
    fn from(err: SdkError<E, R>) -> Self {
        Self::S3(Box::new(aws_sdk_s3::Error::from(err)))
    }
}
