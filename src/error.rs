//! 统一错误模型
//! 定义客户端所有错误类型
//!
//! 解析函数（`from_api`、时间戳/精度解析）从不返回错误，坏数据降级为空字段；
//! 认证与传输失败始终以类型化错误上抛，由调用方决定是否重试。

use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, LoJackError>;

/// 客户端错误类型
#[derive(Debug, Clone, Error)]
pub enum LoJackError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization denied: {0}")]
    Authorization(String),

    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// 原始响应体（用于诊断）
        body: Option<String>,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoJackError {
    /// HTTP 状态码（仅 API 响应类错误有）
    pub fn status(&self) -> Option<u16> {
        match self {
            LoJackError::Authentication(_) => Some(401),
            LoJackError::Authorization(_) => Some(403),
            LoJackError::Api { status, .. } => Some(*status),
            LoJackError::DeviceNotFound(_) => Some(404),
            _ => None,
        }
    }

    /// 是否为认证类失败（refresh 失败回退 login 的判据）
    pub fn is_authentication(&self) -> bool {
        matches!(self, LoJackError::Authentication(_))
    }

    // 便捷方法
    pub fn authentication(msg: impl Into<String>) -> Self {
        LoJackError::Authentication(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        LoJackError::Connection(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        LoJackError::Timeout(msg.into())
    }

    pub fn invalid_parameter(parameter: &str, reason: impl Into<String>) -> Self {
        LoJackError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        LoJackError::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(LoJackError::authentication("bad credentials").status(), Some(401));
        assert_eq!(LoJackError::Authorization("no access".to_string()).status(), Some(403));
        assert_eq!(LoJackError::DeviceNotFound("dev-1".to_string()).status(), Some(404));
        assert_eq!(
            LoJackError::Api {
                status: 500,
                message: "server error".to_string(),
                body: None,
            }
            .status(),
            Some(500)
        );
        assert_eq!(LoJackError::connection("refused").status(), None);
        assert_eq!(LoJackError::timeout("30s elapsed").status(), None);
    }

    #[test]
    fn test_is_authentication() {
        assert!(LoJackError::authentication("expired").is_authentication());
        assert!(!LoJackError::Authorization("denied".to_string()).is_authentication());
        assert!(!LoJackError::connection("refused").is_authentication());
    }

    #[test]
    fn test_display_includes_context() {
        let err = LoJackError::Api {
            status: 502,
            message: "bad gateway".to_string(),
            body: Some("<html>".to_string()),
        };
        assert_eq!(err.to_string(), "API error (HTTP 502): bad gateway");

        let err = LoJackError::invalid_parameter("latitude", "must be within [-90, 90]");
        assert!(err.to_string().contains("latitude"));
        assert!(err.to_string().contains("[-90, 90]"));
    }
}
