use anyhow::Context;
use chrono::NaiveDate;
use chrono_tz::Tz;

pub const DEFAULT_API_BASE: &str = "https://api.notion.com";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_SHEET_NAME: &str = "YWTマップ";

/// Oldest day shown in the matrix and the created-time floor for logs.
pub fn default_floor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub api_base: String,
    pub token: String,
    pub notion_version: String,
    pub ywt_database_id: String,
    pub member_database_id: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub timezone: Tz,
    pub floor: NaiveDate,
    pub max_days: Option<usize>,
    pub expected_sheet: String,
}

impl RunConfig {
    pub fn new(
        timezone: &str,
        floor: NaiveDate,
        max_days: Option<usize>,
        expected_sheet: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .with_context(|| format!("invalid timezone '{timezone}'"))?;
        Ok(Self {
            timezone,
            floor,
            max_days,
            expected_sheet: expected_sheet.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_timezone() {
        let config = RunConfig::new("Asia/Tokyo", default_floor(), None, DEFAULT_SHEET_NAME)
            .expect("valid config");
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.floor.to_string(), "2023-01-01");
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = RunConfig::new("Mars/Olympus", default_floor(), None, DEFAULT_SHEET_NAME)
            .expect_err("unknown zone");
        assert!(err.to_string().contains("Mars/Olympus"));
    }
}
