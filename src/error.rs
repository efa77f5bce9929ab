use serde::Serialize;
use thiserror::Error;

/// 搜索命令的错误
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    Usage(String),

    #[error("Only one of sent-before and sent-after can be specified")]
    ConflictingFilter,

    #[error("unable to parse {flag} value {value:?}: {reason}")]
    DateParse {
        flag: &'static str,
        value: String,
        reason: String,
    },

    #[error("{flag} must be between 1 and {max}, got {value}")]
    LimitExceeded {
        flag: &'static str,
        value: usize,
        max: usize,
    },

    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("cannot search {members_type} conversations in standalone mode")]
    StandaloneUnsupported { members_type: String },

    #[error("search canceled")]
    Canceled,

    #[error("conversation resolution failed: {0}")]
    Resolver(String),

    #[error("timed out waiting for a response to {method}")]
    Timeout { method: String },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub fn usage(msg: impl Into<String>) -> Self {
        SearchError::Usage(msg.into())
    }

    /// 稳定的错误码
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Usage(_) => "usage",
            SearchError::ConflictingFilter => "conflicting_filter",
            SearchError::DateParse { .. } => "date_parse",
            SearchError::LimitExceeded { .. } => "limit_exceeded",
            SearchError::InvalidPattern(_) => "invalid_pattern",
            SearchError::StandaloneUnsupported { .. } => "standalone_unsupported",
            SearchError::Canceled => "canceled",
            SearchError::Resolver(_) => "resolver",
            SearchError::Timeout { .. } => "timeout",
            SearchError::Rpc { .. } => "rpc",
            SearchError::Config(_) => "config",
            SearchError::Io(_) => "io",
            SearchError::Json(_) => "json",
        }
    }

    /// 参数类错误（退出码 2）
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            SearchError::Usage(_)
                | SearchError::ConflictingFilter
                | SearchError::DateParse { .. }
                | SearchError::LimitExceeded { .. }
                | SearchError::InvalidPattern(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_usage() {
            2
        } else {
            1
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// 错误响应
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_class_errors_exit_with_two() {
        assert_eq!(SearchError::ConflictingFilter.exit_code(), 2);
        assert_eq!(SearchError::usage("bad").exit_code(), 2);
        assert_eq!(SearchError::Canceled.exit_code(), 1);
        assert_eq!(
            SearchError::StandaloneUnsupported {
                members_type: "kbfs".into()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn response_carries_code_and_message() {
        let resp = SearchError::LimitExceeded {
            flag: "max-hits",
            value: 10001,
            max: 10000,
        }
        .to_response();
        assert_eq!(resp.error, "limit_exceeded");
        assert_eq!(resp.message, "max-hits must be between 1 and 10000, got 10001");

        let resp = SearchError::Timeout {
            method: "chat.1.local.getSearchRegexp".into(),
        }
        .to_response();
        assert_eq!(resp.error, "timeout");
        assert_eq!(
            resp.message,
            "timed out waiting for a response to chat.1.local.getSearchRegexp"
        );
    }
}
