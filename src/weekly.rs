use crate::cli::CommonArgs;
use crate::export::{member_weekly_rows, weekly_rows};
use crate::model::{MemberWeeklyRow, WeeklyOutput, WeeklyRow, SCHEMA_VERSION};
use crate::session::Session;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use console::style;
use std::collections::HashMap;

pub async fn exec(
    common: CommonArgs,
    json: bool,
    ndjson: bool,
    team: Option<String>,
) -> anyhow::Result<()> {
    let session = Session::prepare(&common).context("Failed to prepare run")?;
    if let Some(t) = &team {
        if !session.roster.teams().any(|known| known == t) {
            anyhow::bail!("Unknown team '{t}'");
        }
    }

    let report = session
        .collect(!(json || ndjson))
        .await
        .context("Failed to collect commits")?;

    let rows: Vec<WeeklyRow> = weekly_rows(&report)
        .into_iter()
        .filter(|r| team.as_deref().map_or(true, |t| r.team == t))
        .collect();
    let member_rows: Vec<MemberWeeklyRow> = member_weekly_rows(&report, &session.roster)
        .into_iter()
        .filter(|r| team.as_deref().map_or(true, |t| r.team == t))
        .collect();

    if json {
        let output = WeeklyOutput {
            version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            since: report.window.start(),
            until: report.window.end(),
            weekly: rows,
            member_weekly: member_rows,
            failures: report.failures.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if ndjson {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
    } else {
        println!(
            "Weekly commits from {} to {}\n",
            report.window.start(),
            report.window.end()
        );
        for t in session.roster.teams() {
            if team.as_deref().map_or(true, |wanted| wanted == t) {
                output_team_chart(t, &rows, &member_rows);
            }
        }
        crate::report::output_failures(&report.failures);
    }

    Ok(())
}

fn bar_glyph(count: u32, max: u32) -> &'static str {
    if count == 0 || max == 0 {
        return " ";
    }
    let intensity = ((count as f64 / max as f64) * 5.0).ceil() as u32;
    match intensity {
        0 | 1 => "▁",
        2 => "▃",
        3 => "▅",
        4 => "▇",
        _ => "█",
    }
}

/// One team's weekly series: the team total plus one column per member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamChart {
    pub team: String,
    /// Display names, roster order.
    pub members: Vec<String>,
    pub weeks: Vec<ChartWeek>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartWeek {
    pub week_start: NaiveDate,
    pub iso_week: String,
    /// Same order as [`TeamChart::members`].
    pub per_member: Vec<u32>,
    pub total: u32,
}

impl TeamChart {
    pub fn build(team: &str, rows: &[WeeklyRow], member_rows: &[MemberWeeklyRow]) -> Option<Self> {
        let team_rows: Vec<&WeeklyRow> = rows.iter().filter(|r| r.team == team).collect();
        if team_rows.is_empty() {
            return None;
        }

        let mut usernames: Vec<&str> = Vec::new();
        let mut members = Vec::new();
        let mut counts: HashMap<(&str, NaiveDate), u32> = HashMap::new();
        for row in member_rows.iter().filter(|r| r.team == team) {
            if !usernames.contains(&row.username.as_str()) {
                usernames.push(row.username.as_str());
                members.push(row.member_display_name.clone());
            }
            counts.insert((row.username.as_str(), row.week_start), row.commit_count);
        }

        let weeks = team_rows
            .into_iter()
            .map(|row| ChartWeek {
                week_start: row.week_start,
                iso_week: row.iso_week.clone(),
                per_member: usernames
                    .iter()
                    .map(|u| counts.get(&(*u, row.week_start)).copied().unwrap_or(0))
                    .collect(),
                total: row.commit_count,
            })
            .collect();

        Some(Self {
            team: team.to_string(),
            members,
            weeks,
        })
    }

    pub fn max_total(&self) -> u32 {
        self.weeks.iter().map(|w| w.total).max().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.weeks.iter().map(|w| w.total).sum()
    }
}

fn column_label(name: &str) -> String {
    name.chars().take(12).collect()
}

/// One row per week: each member's count, the team total, and a bar scaled
/// to the team's busiest week.
pub fn output_team_chart(team: &str, rows: &[WeeklyRow], member_rows: &[MemberWeeklyRow]) {
    let Some(chart) = TeamChart::build(team, rows, member_rows) else {
        return;
    };
    let max = chart.max_total();
    let labels: Vec<String> = chart.members.iter().map(|m| column_label(m)).collect();
    let widths: Vec<usize> = labels.iter().map(|l| l.chars().count().max(3)).collect();

    println!(
        "{} {}",
        style(format!("Weekly Commit Activity - {team}")).bold(),
        style(format!("({} total)", chart.total())).dim()
    );

    let mut header = format!("{:<8} {:<5}", "Week", "Start");
    for (label, width) in labels.iter().zip(&widths) {
        header.push_str(&format!(" {label:>width$}"));
    }
    header.push_str(&format!(" {:>5}", "Total"));
    println!("{}", style(&header).dim());
    println!("{}", "─".repeat(header.chars().count() + 33));

    for week in &chart.weeks {
        let mut cells = String::new();
        for (count, width) in week.per_member.iter().zip(&widths) {
            cells.push_str(&format!(" {count:>width$}"));
        }
        let bar_width = if max == 0 {
            0
        } else {
            ((week.total as f64 / max as f64) * 30.0).round() as usize
        };
        println!(
            "{} {}{} {:>5} {} {}",
            week.iso_week,
            style(week.week_start.format("%m-%d")).dim(),
            cells,
            style(week.total).bold(),
            style(bar_glyph(week.total, max)).green(),
            style("■".repeat(bar_width)).green(),
        );
    }
    println!();
}
