use std::time::Duration;

use shared::error::{AppError, AppResult};

/// 对账服务配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | RECONCILE_INTERVAL_SECS | 30 | 两次对账之间的秒数 |
/// | RECONCILE_BUSINESS_IDS | (空) | 逗号分隔的商户 ID，空表示全部 |
/// | RECONCILE_DRY_RUN | false | 只检测和记录，不写回 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志输出 |
/// | LOG_DIR | (未设置) | 按天滚动的日志目录 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// RECONCILE_INTERVAL_SECS=10 RECONCILE_DRY_RUN=true table-guard watch snapshot.json
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 对账间隔 (秒)
    pub interval_secs: u64,
    /// 需要对账的商户
    pub business_ids: Vec<String>,
    /// 只报告，不修复
    pub dry_run: bool,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

/// Split a comma-separated list, dropping blanks
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的值使用默认值
    pub fn from_env() -> Self {
        Self {
            interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(30),
            business_ids: std::env::var("RECONCILE_BUSINESS_IDS")
                .map(|v| parse_id_list(&v))
                .unwrap_or_default(),
            dry_run: std::env::var("RECONCILE_DRY_RUN")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(false),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> AppResult<()> {
        if self.interval_secs == 0 {
            return Err(AppError::config("RECONCILE_INTERVAL_SECS must be greater than 0")
                .with_detail("interval_secs", self.interval_secs));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            business_ids: Vec::new(),
            dry_run: false,
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
            environment: "development".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorCode;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("b1, b2,,b3 "), vec!["b1", "b2", "b3"]);
        assert!(parse_id_list("  ").is_empty());
    }

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert!(config.is_development());
        assert!(!config.is_production());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = Config {
            interval_secs: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }
}
