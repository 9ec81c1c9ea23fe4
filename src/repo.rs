use std::cmp::Ordering;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::NotionConfig;
use crate::dates::DATE_KEY_FORMAT;
use crate::models::{LogEntry, Member};
use crate::notion::NotionClient;

#[derive(Debug, Default, Deserialize)]
struct PeopleProperty {
    #[serde(default)]
    people: Option<Vec<PersonRef>>,
}

#[derive(Debug, Deserialize)]
struct PersonRef {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleProperty {
    #[serde(default)]
    title: Option<Vec<RichText>>,
}

#[derive(Debug, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NumberProperty {
    #[serde(default)]
    number: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckboxProperty {
    #[serde(default)]
    checkbox: Option<bool>,
}

impl PeopleProperty {
    fn first_id(&self) -> Option<String> {
        self.people
            .as_ref()
            .and_then(|people| people.first())
            .and_then(|person| person.id.clone())
    }

    fn count(&self) -> usize {
        self.people.as_ref().map_or(0, Vec::len)
    }
}

impl TitleProperty {
    fn first_text(&self) -> Option<String> {
        self.title
            .as_ref()
            .and_then(|segments| segments.first())
            .and_then(|segment| segment.plain_text.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct YwtProperties {
    #[serde(rename = "Writer", default)]
    writer: PeopleProperty,
    #[serde(rename = "いいね", default)]
    likes: PeopleProperty,
    #[serde(rename = "Name", default)]
    name: TitleProperty,
}

#[derive(Debug, Deserialize)]
struct YwtPage {
    #[serde(default)]
    properties: YwtProperties,
    #[serde(default)]
    url: String,
}

impl From<YwtPage> for LogEntry {
    fn from(page: YwtPage) -> Self {
        LogEntry {
            author_id: page.properties.writer.first_id(),
            title: page.properties.name.first_text(),
            like_count: page.properties.likes.count(),
            link: page.url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MemberProperties {
    #[serde(rename = "アカウント", default)]
    account: PeopleProperty,
    #[serde(rename = "Name", default)]
    name: TitleProperty,
    #[serde(rename = "社員番号", default)]
    employee_number: NumberProperty,
    #[serde(rename = "旧メンバー", default)]
    former_member: CheckboxProperty,
}

#[derive(Debug, Deserialize)]
struct MemberPage {
    #[serde(default)]
    properties: MemberProperties,
    #[serde(default)]
    url: String,
}

impl From<MemberPage> for Member {
    fn from(page: MemberPage) -> Self {
        Member {
            account_id: page.properties.account.first_id(),
            display_name: page.properties.name.first_text(),
            employee_number: page.properties.employee_number.number,
            is_former: page.properties.former_member.checkbox.unwrap_or(false),
            link: page.url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedData {
    pub members: Vec<Member>,
    pub logs: Vec<LogEntry>,
}

/// Drains both databases: the roster filtered and ordered for display, the
/// logs in raw fetch order.
pub async fn fetch_all(config: &NotionConfig, floor: NaiveDate) -> anyhow::Result<FetchedData> {
    let client = NotionClient::new(config)?;
    let logs = fetch_logs(&client, &config.ywt_database_id, floor).await?;
    let members = fetch_members(&client, &config.member_database_id).await?;
    Ok(FetchedData { members, logs })
}

pub async fn fetch_members(
    client: &NotionClient,
    database_id: &str,
) -> anyhow::Result<Vec<Member>> {
    let pages: Vec<MemberPage> = client
        .query_database(database_id, None)
        .await
        .context("failed to fetch member roster")?;
    let fetched = pages.len();
    let members = sort_members(filter_members(pages.into_iter().map(Member::from).collect()));
    info!(fetched, kept = members.len(), "member roster loaded");
    Ok(members)
}

pub async fn fetch_logs(
    client: &NotionClient,
    database_id: &str,
    floor: NaiveDate,
) -> anyhow::Result<Vec<LogEntry>> {
    let filter = created_on_or_after(floor);
    let pages: Vec<YwtPage> = client
        .query_database(database_id, Some(&filter))
        .await
        .context("failed to fetch ywt logs")?;
    info!(count = pages.len(), since = %floor, "ywt logs loaded");
    Ok(pages.into_iter().map(LogEntry::from).collect())
}

pub fn created_on_or_after(floor: NaiveDate) -> Value {
    json!({
        "timestamp": "created_time",
        "created_time": {
            "on_or_after": floor.format(DATE_KEY_FORMAT).to_string(),
        },
    })
}

/// Drops former members and records without a usable account or name.
pub fn filter_members(members: Vec<Member>) -> Vec<Member> {
    members
        .into_iter()
        .filter(|member| {
            !member.is_former
                && member.display_name.as_deref().is_some_and(|name| !name.is_empty())
                && member.account_id.as_deref().is_some_and(|id| !id.is_empty())
        })
        .collect()
}

/// Stable ascending sort by employee number; members without one go last.
pub fn sort_members(mut members: Vec<Member>) -> Vec<Member> {
    members.sort_by(|a, b| compare_employee_numbers(a.employee_number, b.employee_number));
    members
}

fn compare_employee_numbers(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
