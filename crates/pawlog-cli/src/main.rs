//! `pawlog` — command-line client for the Pawlog API.
//!
//! # Usage
//!
//! ```
//! pawlog --url http://localhost:8080 aggregate rex --since 2024-01-01
//! pawlog diet rex
//! pawlog events rex --category wellness --enrich
//! PAWLOG_TOKEN=... pawlog chat rex "Is Rex eating enough?"
//! ```

mod client;

use std::{collections::BTreeMap, fmt::Write as _};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{Aggregate, ApiClient, ApiConfig, DietRow};
use serde::Deserialize;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pawlog", about = "Command-line client for the Pawlog API")]
struct Args {
  /// Path to a TOML config file (url, token).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the pawlog server (default: http://localhost:8080).
  #[arg(long, env = "PAWLOG_URL")]
  url: Option<String>,

  /// Bearer token for `chat`.
  #[arg(long, env = "PAWLOG_TOKEN")]
  token: Option<String>,

  /// Print raw JSON instead of a table.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Trend and composite score for a subject.
  Aggregate {
    subject: String,
    /// Earliest event time to include.
    #[arg(long)]
    since:   Option<String>,
    /// Latest event time to include.
    #[arg(long)]
    until:   Option<String>,
  },
  /// Diet entries grouped by food type.
  Diet { subject: String },
  /// Raw events of one category.
  Events {
    subject:  String,
    #[arg(long)]
    category: String,
    /// Attach the subject's name to each event.
    #[arg(long)]
    enrich:   bool,
  },
  /// Ask the assistant about a subject.
  Chat { subject: String, question: String },
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:   String,
  #[serde(default)]
  token: String,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    token:    args
      .token
      .or_else(|| (!file_cfg.token.is_empty()).then(|| file_cfg.token.clone())),
  };
  let client = ApiClient::new(api_config)?;

  let output = match args.command {
    Command::Aggregate { subject, since, until } => {
      let (view, raw) = client.aggregate(&subject, since.as_deref(), until.as_deref()).await?;
      if args.json { pretty(&raw)? } else { render_aggregate(&view) }
    }
    Command::Diet { subject } => {
      let groups = client.diet(&subject).await?;
      if args.json { pretty(&groups_json(&groups))? } else { render_diet(&groups) }
    }
    Command::Events { subject, category, enrich } => {
      let events = client.events(&subject, &category, enrich).await?;
      pretty(&serde_json::Value::Array(events))?
    }
    Command::Chat { subject, question } => client.chat(&subject, &question).await?,
  };
  println!("{output}");
  Ok(())
}

// ─── Rendering ───────────────────────────────────────────────────────────────

fn pretty(value: &serde_json::Value) -> Result<String> {
  serde_json::to_string_pretty(value).context("formatting JSON")
}

fn groups_json(groups: &BTreeMap<String, Vec<DietRow>>) -> serde_json::Value {
  groups
    .iter()
    .map(|(food, rows)| {
      let rows = rows
        .iter()
        .map(|r| {
          serde_json::json!({
            "event_id": r.event_id,
            "time": r.time,
            "quantity_grams": r.quantity_grams,
            "brand_name": r.brand_name,
          })
        })
        .collect();
      (food.clone(), serde_json::Value::Array(rows))
    })
    .collect::<serde_json::Map<_, _>>()
    .into()
}

fn render_aggregate(view: &Aggregate) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{}  score {:.1}", view.subject_id, view.current_score);
  if !view.unavailable.is_empty() {
    let _ = writeln!(out, "unavailable: {}", view.unavailable.join(", "));
  }
  for row in &view.trend {
    let _ = writeln!(
      out,
      "{:<26} {:<10} {:>6.1}  {}",
      row.time, row.category, row.score, row.event_id
    );
  }
  out.trim_end().to_owned()
}

fn render_diet(groups: &BTreeMap<String, Vec<DietRow>>) -> String {
  let mut out = String::new();
  for (food, rows) in groups {
    let total: f64 = rows.iter().map(|r| r.quantity_grams).sum();
    let _ = writeln!(out, "{food} ({} entries, {total:.0} g)", rows.len());
    for row in rows {
      let brand = row.brand_name.as_deref().unwrap_or("-");
      let _ = writeln!(out, "  {:<26} {:>7.0} g  {brand}", row.time, row.quantity_grams);
    }
  }
  out.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
  use super::*;
  use client::TrendRow;

  #[test]
  fn aggregate_table_lists_points_and_gaps() {
    let view = Aggregate {
      subject_id:    "rex".into(),
      current_score: 66.666,
      trend:         vec![TrendRow {
        time:     "2024-01-01T08:00:00.000Z".into(),
        category: "exercise".into(),
        event_id: "e1".into(),
        score:    50.0,
      }],
      unavailable:   vec!["wellness".into()],
    };
    let table = render_aggregate(&view);
    let lines: Vec<_> = table.lines().collect();
    assert_eq!(lines[0], "rex  score 66.7");
    assert_eq!(lines[1], "unavailable: wellness");
    assert!(lines[2].starts_with("2024-01-01T08:00:00.000Z   exercise"));
    assert!(lines[2].ends_with("50.0  e1"));
  }

  #[test]
  fn diet_table_totals_each_group() {
    let groups = BTreeMap::from([("kibble".to_owned(), vec![
      DietRow {
        event_id:       "d1".into(),
        time:           "2024-01-01T08:00:00.000Z".into(),
        quantity_grams: 120.0,
        brand_name:     None,
      },
      DietRow {
        event_id:       "d2".into(),
        time:           "2024-01-01T18:00:00.000Z".into(),
        quantity_grams: 80.0,
        brand_name:     Some("Acme".into()),
      },
    ])]);
    let table = render_diet(&groups);
    assert!(table.starts_with("kibble (2 entries, 200 g)"));
    assert!(table.ends_with("Acme"));
    assert_eq!(groups_json(&groups)["kibble"][1]["brand_name"], "Acme");
  }
}
