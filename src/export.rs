use crate::aggregate::AggregateReport;
use crate::cli::CommonArgs;
use crate::error::Result;
use crate::model::{
    Commit, DateWindow, ExportOutput, LedgerRow, MemberWeeklyRow, WeeklyRow, SCHEMA_VERSION,
    UNATTRIBUTED_TEAM,
};
use crate::roster::Roster;
use crate::session::Session;
use crate::util::{week_end, week_key, week_start_of, weeks_spanning};
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use console::style;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LEDGER_FILE_PREFIX: &str = "team_productivity_report";
pub const WEEKLY_FILE_PREFIX: &str = "weekly_commit_trend";

pub async fn exec(common: CommonArgs, json: bool, ndjson: bool) -> anyhow::Result<()> {
    let session = Session::prepare(&common).context("Failed to prepare run")?;
    let report = session
        .collect(!(json || ndjson))
        .await
        .context("Failed to collect commits")?;
    let rows = ledger_rows(&report.ledger);

    if json {
        output_json(&rows, &report)?;
    } else if ndjson {
        output_ndjson(&rows)?;
    } else {
        output_summary(&rows)?;
        crate::report::output_failures(&report.failures);
    }

    Ok(())
}

pub fn ledger_row(commit: &Commit) -> LedgerRow {
    let display_name = commit
        .member
        .member()
        .map(|m| m.display_name.clone())
        .unwrap_or_else(|| UNATTRIBUTED_TEAM.to_string());
    LedgerRow {
        team: commit.member.team().to_string(),
        member_display_name: display_name,
        repository: commit.repository.to_string(),
        sha: commit.sha.clone(),
        timestamp: commit.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        message: commit.message.clone(),
        url: commit.url.clone(),
    }
}

pub fn ledger_rows(ledger: &[Commit]) -> Vec<LedgerRow> {
    ledger.iter().map(ledger_row).collect()
}

pub fn weekly_rows(report: &AggregateReport) -> Vec<WeeklyRow> {
    report
        .weekly
        .iter()
        .map(|b| WeeklyRow {
            team: b.team.clone(),
            week_start: b.week_start,
            week_end: week_end(b.week_start),
            iso_week: week_key(b.week_start),
            commit_count: b.commit_count,
        })
        .collect()
}

/// Per-member weekly counts derived from the ledger, one row for every
/// roster member and every week of the window. Ordered by week, then team,
/// then roster order.
pub fn member_weekly_rows(report: &AggregateReport, roster: &Roster) -> Vec<MemberWeeklyRow> {
    let mut counts: HashMap<(&str, chrono::NaiveDate), u32> = HashMap::new();
    for commit in &report.ledger {
        if let Some(member) = commit.member.member() {
            *counts
                .entry((member.username.as_str(), week_start_of(&commit.timestamp)))
                .or_insert(0) += 1;
        }
    }

    let mut rows = Vec::new();
    for week in weeks_spanning(report.window.start(), report.window.end()) {
        for team in roster.teams() {
            for member in roster.team_members(team) {
                rows.push(MemberWeeklyRow {
                    team: team.to_string(),
                    username: member.username.clone(),
                    member_display_name: member.display_name.clone(),
                    week_start: week,
                    iso_week: week_key(week),
                    commit_count: counts
                        .get(&(member.username.as_str(), week))
                        .copied()
                        .unwrap_or(0),
                });
            }
        }
    }
    rows
}

pub fn write_ledger_csv<W: Write>(rows: &[LedgerRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_weekly_csv<W: Write>(rows: &[WeeklyRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `<prefix>_<start>_<end>.csv`
pub fn report_filename(prefix: &str, window: &DateWindow) -> String {
    format!("{prefix}_{}_{}.csv", window.start(), window.end())
}

/// Writes the ledger and weekly CSVs into `out_dir`, returning their paths.
pub fn write_report_files(report: &AggregateReport, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;

    let ledger_path = out_dir.join(report_filename(LEDGER_FILE_PREFIX, &report.window));
    write_ledger_csv(
        &ledger_rows(&report.ledger),
        std::fs::File::create(&ledger_path)?,
    )?;

    let weekly_path = out_dir.join(report_filename(WEEKLY_FILE_PREFIX, &report.window));
    write_weekly_csv(&weekly_rows(report), std::fs::File::create(&weekly_path)?)?;

    Ok(vec![ledger_path, weekly_path])
}

fn output_json(rows: &[LedgerRow], report: &AggregateReport) -> anyhow::Result<()> {
    let output = ExportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        since: report.window.start(),
        until: report.window.end(),
        entries: rows.to_vec(),
        failures: report.failures.clone(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_ndjson(rows: &[LedgerRow]) -> anyhow::Result<()> {
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

fn output_summary(rows: &[LedgerRow]) -> anyhow::Result<()> {
    println!("{}", style("Export Summary").bold());
    println!("{}", "─".repeat(50));

    let repositories: HashSet<_> = rows.iter().map(|r| &r.repository).collect();
    let members: HashSet<_> = rows.iter().map(|r| &r.member_display_name).collect();
    let teams: HashSet<_> = rows.iter().map(|r| &r.team).collect();

    println!("Total commits: {}", style(rows.len()).cyan());
    println!("Repositories: {}", style(repositories.len()).cyan());
    println!("Contributors: {}", style(members.len()).yellow());
    println!("Teams: {}", style(teams.len()).yellow());

    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        println!(
            "Date range: {} to {}",
            style(first.timestamp.get(..10).unwrap_or(first.timestamp.as_str())).dim(),
            style(last.timestamp.get(..10).unwrap_or(last.timestamp.as_str())).dim()
        );
    }

    println!("\nUse --json or --ndjson flags to export the raw data.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::model::{Attribution, TeamMember};
    use chrono::{DateTime, NaiveDate};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn report() -> AggregateReport {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        )
        .unwrap();
        let alice = Arc::new(TeamMember {
            username: "alice".into(),
            display_name: "Alice Doe".into(),
            team: "titans".into(),
        });
        let mut agg = Aggregator::new(window, ["titans"]);
        agg.ingest(Commit {
            sha: "abc".into(),
            member: Attribution::Member(alice),
            repository: "org/repo1".parse().unwrap(),
            timestamp: "2025-01-07T08:30:00Z".parse::<DateTime<Utc>>().unwrap(),
            message: "feat: add, with \"quotes\"".into(),
            url: "https://github.com/org/repo1/commit/abc".into(),
        });
        agg.finalize()
    }

    #[test]
    fn ledger_csv_has_header_and_quoted_fields() {
        let report = report();
        let mut buf = Vec::new();
        write_ledger_csv(&ledger_rows(&report.ledger), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("team,member_display_name,repository,sha,timestamp,message,url")
        );
        assert_eq!(
            lines.next(),
            Some("titans,Alice Doe,org/repo1,abc,2025-01-07T08:30:00Z,\"feat: add, with \"\"quotes\"\"\",https://github.com/org/repo1/commit/abc")
        );
    }

    #[test]
    fn weekly_csv_is_zero_filled() {
        let report = report();
        let mut buf = Vec::new();
        write_weekly_csv(&weekly_rows(&report), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "team,week_start,week_end,iso_week,commit_count",
                "titans,2024-12-30,2025-01-05,2025-W01,0",
                "titans,2025-01-06,2025-01-12,2025-W02,1",
            ]
        );
    }

    #[test]
    fn member_rows_cover_every_member_and_week() {
        let report = report();
        let roster = Roster::new(vec![
            TeamMember {
                username: "alice".into(),
                display_name: "Alice Doe".into(),
                team: "titans".into(),
            },
            TeamMember {
                username: "bob".into(),
                display_name: "Bob Roe".into(),
                team: "titans".into(),
            },
        ])
        .unwrap();

        let rows = member_weekly_rows(&report, &roster);
        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.iso_week.as_str(), r.username.as_str(), r.commit_count))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("2025-W01", "alice", 0),
                ("2025-W01", "bob", 0),
                ("2025-W02", "alice", 1),
                ("2025-W02", "bob", 0),
            ]
        );
    }

    #[test]
    fn report_files_are_date_suffixed() {
        let report = report();
        let dir = tempfile::tempdir().unwrap();
        let paths = write_report_files(&report, dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "team_productivity_report_2025-01-01_2025-01-12.csv",
                "weekly_commit_trend_2025-01-01_2025-01-12.csv",
            ]
        );
        assert!(paths.iter().all(|p| p.exists()));
    }
}
