use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{NotionConfig, RunConfig};
use crate::models::{Matrix, MemberScore};
use crate::sheet::{OutputFormat, SheetGrid, Surface};
use crate::{dates, matrix, repo, report};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Written {
        members: usize,
        dates: usize,
        out: PathBuf,
    },
    WrongSheet {
        expected: String,
        actual: String,
    },
}

/// Builds the full matrix: both databases plus the date axis anchored at `now`.
pub async fn build(
    notion: &NotionConfig,
    run: &RunConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<Matrix> {
    let data = repo::fetch_all(notion, run.floor).await?;
    let today = dates::today_in(now, run.timezone);
    let date_keys = dates::date_range(today, run.floor, run.max_days);
    let matrix = matrix::build_matrix(&data.members, &data.logs, &date_keys);
    info!(
        members = matrix.rows.len(),
        dates = matrix.dates.len(),
        logs = data.logs.len(),
        "ywt matrix built"
    );
    Ok(matrix)
}

/// Refreshes the named sheet with the date axis anchored at `now`. Nothing is
/// fetched or written unless the sheet is the expected one.
pub async fn refresh(
    notion: &NotionConfig,
    run: &RunConfig,
    sheet: &str,
    out: PathBuf,
    format: OutputFormat,
    now: DateTime<Utc>,
) -> anyhow::Result<RunOutcome> {
    if sheet != run.expected_sheet {
        warn!(expected = %run.expected_sheet, actual = sheet, "refresh refused for sheet");
        return Ok(RunOutcome::WrongSheet {
            expected: run.expected_sheet.clone(),
            actual: sheet.to_string(),
        });
    }

    let matrix = build(notion, run, now).await?;

    let mut grid = SheetGrid::new(sheet);
    let updated_at = report::format_updated_at(Utc::now(), run.timezone);
    report::render_matrix(&mut grid, &matrix, &updated_at)?;
    grid.write_to(&out, format)?;
    info!(
        sheet = grid.name(),
        out = %out.display(),
        filter = ?grid.filter().map(|filter| (filter.range, filter.sort)),
        "sheet written"
    );

    Ok(RunOutcome::Written {
        members: matrix.rows.len(),
        dates: matrix.dates.len(),
        out,
    })
}

pub async fn score(
    notion: &NotionConfig,
    run: &RunConfig,
) -> anyhow::Result<(Matrix, Vec<MemberScore>)> {
    let matrix = build(notion, run, Utc::now()).await?;
    let scores = matrix::rank_members(&matrix);
    Ok((matrix, scores))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::config::DEFAULT_SHEET_NAME;

    fn notion_config(api_base: String) -> NotionConfig {
        NotionConfig {
            api_base,
            token: "secret-token".to_string(),
            notion_version: "2022-06-28".to_string(),
            ywt_database_id: "ywt-db".to_string(),
            member_database_id: "member-db".to_string(),
            request_timeout_ms: 2_000,
        }
    }

    fn run_config(floor: NaiveDate) -> RunConfig {
        RunConfig::new("UTC", floor, None, DEFAULT_SHEET_NAME).expect("run config")
    }

    #[tokio::test]
    async fn wrong_sheet_is_refused_without_requests() {
        let server = MockServer::start();
        let any = server.mock(|when, then| {
            when.method(POST);
            then.status(500);
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("map.csv");

        let outcome = refresh(
            &notion_config(server.base_url()),
            &run_config(NaiveDate::from_ymd_opt(2023, 1, 1).expect("date")),
            "Sheet1",
            out.clone(),
            OutputFormat::Csv,
            Utc::now(),
        )
        .await
        .expect("guard is not an error");

        assert_eq!(
            outcome,
            RunOutcome::WrongSheet {
                expected: DEFAULT_SHEET_NAME.to_string(),
                actual: "Sheet1".to_string(),
            }
        );
        assert_eq!(any.calls(), 0);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn refresh_writes_matrix_csv() {
        let now = Utc
            .with_ymd_and_hms(2024, 5, 3, 23, 59, 59)
            .single()
            .expect("valid instant");
        let today = NaiveDate::from_ymd_opt(2024, 5, 3).expect("date");
        let yesterday = today - Duration::days(1);
        let floor = today - Duration::days(2);
        let day = |date: NaiveDate| date.format("%Y-%m-%d").to_string();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/databases/ywt-db/query");
            then.status(200).json_body(json!({
                "results": [
                    {
                        "url": "https://notion.so/log-1",
                        "properties": {
                            "Writer": { "people": [{ "id": "user-a" }] },
                            "いいね": { "people": [{ "id": "user-b" }] },
                            "Name": { "title": [{ "plain_text": format!("{} YWT", day(yesterday)) }] }
                        }
                    }
                ],
                "has_more": false,
                "next_cursor": null
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1/databases/member-db/query");
            then.status(200).json_body(json!({
                "results": [
                    {
                        "url": "https://notion.so/alice",
                        "properties": {
                            "アカウント": { "people": [{ "id": "user-a" }] },
                            "Name": { "title": [{ "plain_text": "Alice" }] },
                            "社員番号": { "number": 1 },
                            "旧メンバー": { "checkbox": false }
                        }
                    }
                ],
                "has_more": false,
                "next_cursor": null
            }));
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("map.csv");
        let outcome = refresh(
            &notion_config(server.base_url()),
            &run_config(floor),
            DEFAULT_SHEET_NAME,
            out.clone(),
            OutputFormat::Csv,
            now,
        )
        .await
        .expect("refresh");

        assert_eq!(
            outcome,
            RunOutcome::Written {
                members: 1,
                dates: 3,
                out: out.clone(),
            }
        );

        let written = std::fs::read_to_string(&out).expect("output written");
        let lines: Vec<&str> = written.lines().collect();
        assert!(lines[0].starts_with("updated at: "));
        assert_eq!(
            lines[1],
            format!(
                "employee number,member,total score,entry count,{},{},{}",
                day(today),
                day(yesterday),
                day(floor)
            )
        );
        assert_eq!(
            lines[2],
            "1,\"=HYPERLINK(\"\"https://notion.so/alice\"\", \"\"Alice\"\")\",2,1,,\"=HYPERLINK(\"\"https://notion.so/log-1\"\", 2)\","
        );
    }

    #[tokio::test]
    async fn fetch_failure_aborts_before_writing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(502).body("bad gateway");
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("map.csv");

        let err = refresh(
            &notion_config(server.base_url()),
            &run_config(NaiveDate::from_ymd_opt(2023, 1, 1).expect("date")),
            DEFAULT_SHEET_NAME,
            out.clone(),
            OutputFormat::Csv,
            Utc::now(),
        )
        .await
        .expect_err("upstream failure");

        assert!(format!("{err:#}").contains("502"));
        assert!(!out.exists());
    }
}
