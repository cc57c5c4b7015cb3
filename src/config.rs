//! 配置系统
//! 支持从环境变量加载或程序内构造，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

/// 默认身份服务地址
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.spireon.com";
/// 默认业务服务地址
pub const DEFAULT_SERVICES_URL: &str = "https://services.spireon.com/v0/rest";

/// 客户端配置
///
/// 所有默认值都在这里集中声明，构造后显式传入各组件，
/// 不存在模块级可变状态。
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// 账号用户名/邮箱（会话恢复场景下可缺省）
    #[serde(default)]
    pub username: Option<String>,

    /// 账号密码（使用 Secret 包装，防止日志泄露）
    #[serde(default)]
    pub password: Option<Secret<String>>,

    /// 身份服务地址（登录/刷新）
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// 业务服务地址（资产/事件/围栏等）
    #[serde(default = "default_services_url")]
    pub services_url: String,

    /// X-Nspire-Apptoken 应用令牌（可选，使用 Secret 包装）
    #[serde(default)]
    pub app_token: Option<Secret<String>>,

    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// 令牌过期前多少秒触发主动刷新
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin_secs: u64,
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

fn default_services_url() -> String {
    DEFAULT_SERVICES_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_refresh_margin() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            identity_url: default_identity_url(),
            services_url: default_services_url(),
            app_token: None,
            request_timeout_secs: default_request_timeout(),
            token_refresh_margin_secs: default_refresh_margin(),
        }
    }
}

impl ClientConfig {
    /// 使用用户名密码构造配置，其余字段取默认值
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(Secret::new(password.into())),
            ..Self::default()
        }
    }

    /// 从环境变量加载配置
    ///
    /// 变量名以 `LOJACK_` 为前缀，例如 `LOJACK_USERNAME`、`LOJACK_PASSWORD`、
    /// `LOJACK_TOKEN_REFRESH_MARGIN_SECS`。
    pub fn from_env() -> crate::error::Result<Self> {
        Self::load_env()
            .map_err(|e| crate::error::LoJackError::config(format!("invalid configuration: {e}")))
    }

    fn load_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            // 默认配置
            .set_default("identity_url", DEFAULT_IDENTITY_URL)?
            .set_default("services_url", DEFAULT_SERVICES_URL)?
            .set_default("request_timeout_secs", default_request_timeout() as i64)?
            .set_default("token_refresh_margin_secs", default_refresh_margin() as i64)?
            // 从环境变量加载（前缀为 LOJACK_）
            .add_source(Environment::with_prefix("LOJACK").try_parsing(true))
            .build()?;

        settings.try_deserialize()
    }

    /// 请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 刷新提前量
    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_refresh_margin_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.identity_url, DEFAULT_IDENTITY_URL);
        assert_eq!(config.services_url, DEFAULT_SERVICES_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.token_refresh_margin_secs, 60);
        assert!(config.username.is_none());
        assert!(config.password.is_none());
        assert!(config.app_token.is_none());
    }

    #[test]
    fn test_with_credentials() {
        let config = ClientConfig::with_credentials("user@example.com", "hunter2");
        assert_eq!(config.username.as_deref(), Some("user@example.com"));
        assert_eq!(
            config.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("hunter2")
        );
        // 其余字段保持默认
        assert_eq!(config.identity_url, DEFAULT_IDENTITY_URL);
    }

    #[test]
    fn test_durations() {
        let config = ClientConfig {
            request_timeout_secs: 10,
            token_refresh_margin_secs: 120,
            ..ClientConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_margin(), chrono::Duration::seconds(120));
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let config = ClientConfig::with_credentials("user", "super-secret-password");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-password"));
    }
}
