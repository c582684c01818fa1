use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("html could not be rewritten: {message}")]
    Rewrite { message: String },
}

impl ConvertError {
    pub fn rewrite(message: impl Into<String>) -> Self {
        Self::Rewrite {
            message: message.into(),
        }
    }
}

/// HTML to Markdown text transform.
pub trait Converter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String, ConvertError>;
}
