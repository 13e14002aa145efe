use crate::aggregate::AggregateReport;
use crate::cli::CommonArgs;
use crate::export::{ledger_rows, member_weekly_rows, weekly_rows, write_report_files};
use crate::model::{PairFailure, ReportOutput, SCHEMA_VERSION};
use crate::roster::Roster;
use crate::session::Session;
use crate::weekly::output_team_chart;
use anyhow::Context;
use chrono::Utc;
use console::style;
use std::collections::HashMap;
use std::path::PathBuf;

pub async fn exec(common: CommonArgs, out_dir: PathBuf, json: bool) -> anyhow::Result<()> {
    let session = Session::prepare(&common).context("Failed to prepare run")?;
    let report = session
        .collect(!json)
        .await
        .context("Failed to collect commits")?;

    let files = write_report_files(&report, &out_dir).context("Failed to write CSV reports")?;

    if json {
        output_json(&report, &session.roster)?;
    } else {
        output_team_summary(&report, &session.roster);
        let rows = weekly_rows(&report);
        let member_rows = member_weekly_rows(&report, &session.roster);
        for team in session.roster.teams() {
            output_team_chart(team, &rows, &member_rows);
        }
        output_failures(&report.failures);
        output_files(&files);
    }

    Ok(())
}

fn output_json(report: &AggregateReport, roster: &Roster) -> anyhow::Result<()> {
    let output = ReportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        since: report.window.start(),
        until: report.window.end(),
        ledger: ledger_rows(&report.ledger),
        weekly: weekly_rows(report),
        member_weekly: member_weekly_rows(report, roster),
        failures: report.failures.clone(),
        stats: report.stats,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_team_summary(report: &AggregateReport, roster: &Roster) {
    let mut per_member: HashMap<&str, usize> = HashMap::new();
    for commit in &report.ledger {
        if let Some(member) = commit.member.member() {
            *per_member.entry(member.username.as_str()).or_insert(0) += 1;
        }
    }

    println!("{}", style("Team Productivity Summary").bold());
    println!("{}", style(format!("{} to {}", report.window.start(), report.window.end())).dim());

    for team in roster.teams() {
        let members: Vec<_> = roster.team_members(team).collect();
        let total: usize = members
            .iter()
            .map(|m| per_member.get(m.username.as_str()).copied().unwrap_or(0))
            .sum();
        println!("\n{} {}", style(team).cyan().bold(), style(format!("({total} commits)")).dim());
        for member in members {
            let count = per_member.get(member.username.as_str()).copied().unwrap_or(0);
            println!("  {:<30} {:>5} commits", member.display_name, count);
        }
    }

    let stats = report.stats;
    if stats.duplicates_dropped > 0 || stats.outside_window_dropped > 0 || stats.unattributed > 0 {
        println!(
            "\n{}",
            style(format!(
                "Dropped {} duplicate(s), {} outside the window; {} unattributed",
                stats.duplicates_dropped, stats.outside_window_dropped, stats.unattributed
            ))
            .dim()
        );
    }
    println!();
}

pub fn output_failures(failures: &[PairFailure]) {
    if failures.is_empty() {
        return;
    }
    println!(
        "{}",
        style(format!("Skipped {} pair(s); results are partial:", failures.len()))
            .yellow()
            .bold()
    );
    for f in failures {
        println!(
            "  {} {} @ {}: {}",
            style(f.kind).red(),
            f.member,
            f.repository,
            style(&f.detail).dim()
        );
    }
    println!();
}

fn output_files(files: &[PathBuf]) {
    for file in files {
        println!("{} Saved {}", style("✔").green(), file.display());
    }
}
