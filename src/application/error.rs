use std::error::Error as StdError;

use axum::{
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{convert::ConvertError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// What a lookup was about. Selects the wording of not-found notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Content,
    TaxonomyTerm,
    TaxonomyArchive,
}

impl Subject {
    fn as_str(self) -> &'static str {
        match self {
            Subject::Content => "content",
            Subject::TaxonomyTerm => "taxonomy term",
            Subject::TaxonomyArchive => "taxonomy archive",
        }
    }
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("{} `{reference}` not found", subject.as_str())]
    NotFound { subject: Subject, reference: String },
    #[error("{} `{reference}` is excluded from the mirror", subject.as_str())]
    ExcludedByPolicy { subject: Subject, reference: String },
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConvertError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("link `{url}` left unexpanded: {reason}")]
    LinkResolution { url: String, reason: String },
}

impl MirrorError {
    pub fn not_found(subject: Subject, reference: impl Into<String>) -> Self {
        Self::NotFound {
            subject,
            reference: reference.into(),
        }
    }

    pub fn excluded(subject: Subject, reference: impl Into<String>) -> Self {
        Self::ExcludedByPolicy {
            subject,
            reference: reference.into(),
        }
    }

    pub fn link_resolution(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LinkResolution {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Not-found and excluded lookups are served identically.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MirrorError::NotFound { .. } | MirrorError::ExcludedByPolicy { .. }
        )
    }

    /// Markdown body served with a 404.
    pub fn not_found_notice(&self) -> Option<&'static str> {
        let notice = match self {
            MirrorError::NotFound {
                subject: Subject::TaxonomyTerm,
                ..
            } => "# 404 Not Found\n\nThe requested taxonomy term could not be found.",
            MirrorError::NotFound { .. } => {
                "# 404 Not Found\n\nThe requested content could not be found."
            }
            MirrorError::ExcludedByPolicy {
                subject: Subject::Content,
                ..
            } => "# 404 Not Found\n\nThis content is not available in Markdown format.",
            MirrorError::ExcludedByPolicy { .. } => {
                "# 404 Not Found\n\nThis taxonomy archive is not available in Markdown format."
            }
            _ => return None,
        };
        Some(notice)
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// HTTP failure rendered as a Markdown notice.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_mirror(source: &'static str, error: &MirrorError) -> Self {
        match error.not_found_notice() {
            Some(body) => Self {
                status: StatusCode::NOT_FOUND,
                body,
                report: ErrorReport::from_error(source, StatusCode::NOT_FOUND, error),
            },
            None => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "# 500 Internal Server Error\n\nThe document could not be generated.",
                report: ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, error),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(MARKDOWN_CONTENT_TYPE));
        self.report.attach(&mut response);
        response
    }
}

/// Errors surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_follow_subject() {
        let cases = [
            (
                MirrorError::not_found(Subject::Content, "missing"),
                "The requested content could not be found.",
            ),
            (
                MirrorError::excluded(Subject::Content, "hidden"),
                "This content is not available in Markdown format.",
            ),
            (
                MirrorError::excluded(Subject::TaxonomyArchive, "tag"),
                "This taxonomy archive is not available in Markdown format.",
            ),
            (
                MirrorError::not_found(Subject::TaxonomyTerm, "rust"),
                "The requested taxonomy term could not be found.",
            ),
        ];

        for (error, detail) in cases {
            let notice = error.not_found_notice().expect("404 notice");
            assert_eq!(notice, format!("# 404 Not Found\n\n{detail}"));
            assert!(error.is_not_found());
        }
    }

    #[test]
    fn build_failures_are_server_errors() {
        let error = MirrorError::from(ConvertError::rewrite("bad html"));
        assert!(error.not_found_notice().is_none());
        let http = HttpError::from_mirror("test", &error);
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
