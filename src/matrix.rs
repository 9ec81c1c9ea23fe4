use std::collections::HashMap;

use crate::dates::DATE_KEY_LEN;
use crate::models::{Cell, LogEntry, Matrix, MatrixRow, Member, MemberScore};

/// Joins logs to members per date. For each (member, date) the first log in
/// fetch order whose title starts with the date and whose author is the member
/// fills the cell; later duplicates are ignored.
pub fn build_matrix(members: &[Member], logs: &[LogEntry], dates: &[String]) -> Matrix {
    let index = index_logs(logs);

    let rows = members
        .iter()
        .map(|member| {
            let mut total_score = 0_u32;
            let mut entry_count = 0_u32;

            let cells = dates
                .iter()
                .map(|date| {
                    let entry = member.account_id.as_deref().and_then(|account| {
                        if date.len() == DATE_KEY_LEN {
                            index.get(&(account, date.as_str())).copied()
                        } else {
                            first_match(logs, account, date)
                        }
                    })?;
                    let score = entry_score(entry);
                    total_score = total_score.saturating_add(score);
                    entry_count += 1;
                    Some(Cell {
                        score,
                        link: entry.link.clone(),
                    })
                })
                .collect();

            MatrixRow {
                member: member.clone(),
                total_score,
                entry_count,
                cells,
            }
        })
        .collect();

    Matrix {
        dates: dates.to_vec(),
        rows,
    }
}

/// One point for writing the entry plus one per like.
pub fn entry_score(entry: &LogEntry) -> u32 {
    u32::try_from(entry.like_count)
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

/// Members ordered by total score, highest first; ties keep display order.
pub fn rank_members(matrix: &Matrix) -> Vec<MemberScore> {
    let mut scores: Vec<MemberScore> = matrix
        .rows
        .iter()
        .map(|row| MemberScore {
            employee_number: row.member.employee_number,
            name: row.member.name().to_string(),
            total_score: row.total_score,
            entry_count: row.entry_count,
        })
        .collect();
    scores.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    scores
}

fn index_logs(logs: &[LogEntry]) -> HashMap<(&str, &str), &LogEntry> {
    let mut index = HashMap::new();
    for log in logs {
        let (Some(author), Some(title)) = (log.author_id.as_deref(), log.title.as_deref()) else {
            continue;
        };
        let Some(prefix) = title.get(..DATE_KEY_LEN) else {
            continue;
        };
        index.entry((author, prefix)).or_insert(log);
    }
    index
}

fn first_match<'a>(logs: &'a [LogEntry], account: &str, date: &str) -> Option<&'a LogEntry> {
    logs.iter().find(|log| {
        log.title.as_deref().is_some_and(|title| title.starts_with(date))
            && log.author_id.as_deref() == Some(account)
    })
}
