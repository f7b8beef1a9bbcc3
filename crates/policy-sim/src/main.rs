//! Simulation harness CLI (spec.md §4.I): evaluates an "old" and a "new" policy
//! document against the same set of pull-request fixtures and reports every
//! Status transition between them, tolerating an error on either side.

#![deny(unsafe_code)]

use clap::{Parser, Subcommand};
use policy::context::{StaticPullContext, StaticPullContextData};
use policy::{PolicyFile, Status};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "policy-simulate", about = "Diff two policy documents over shared pull-request fixtures")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate `--old` and `--new` policy documents against every fixture under
    /// `--fixtures` and print the ones whose Status transitioned.
    Diff {
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        new: PathBuf,
        #[arg(long)]
        fixtures: PathBuf,
        /// Include fixtures whose status did not change in the output.
        #[arg(long, default_value_t = false)]
        show_unchanged: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_json_logging();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Diff { old, new, fixtures, show_unchanged } => {
            cmd_diff(&old, &new, &fixtures, show_unchanged)?
        }
    }
    Ok(())
}

fn load_policy(path: &Path) -> Result<PolicyFile, Box<dyn std::error::Error>> {
    let source = fs::read_to_string(path)?;
    Ok(PolicyFile::from_yaml(&source)?)
}

fn load_fixtures(dir: &Path) -> Result<Vec<(String, StaticPullContextData)>, Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    for path in paths {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("fixture")
            .to_string();
        let source = fs::read_to_string(&path)?;
        let data: StaticPullContextData = serde_json::from_str(&source)?;
        out.push((name, data));
    }
    Ok(out)
}

/// One fixture's outcome under a single policy document.
struct Outcome {
    status: Status,
    status_description: String,
}

fn evaluate(policy: &PolicyFile, data: StaticPullContextData) -> Outcome {
    let ctx = StaticPullContext::new(data);
    match policy.approval.evaluate(&ctx, &policy.rule_set()) {
        Ok(result) => Outcome { status: result.status, status_description: result.status_description },
        Err(e) => Outcome { status: Status::Error, status_description: e.to_string() },
    }
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Skipped => "skipped",
        Status::Pending => "pending",
        Status::Approved => "approved",
        Status::Disapproved => "disapproved",
        Status::Error => "error",
    }
}

fn cmd_diff(
    old_path: &Path,
    new_path: &Path,
    fixtures_dir: &Path,
    show_unchanged: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let trace_id = policy_core::ids::new_trace_id();
    let span = tracing::info_span!("policy_simulate.diff", trace_id = %trace_id);
    let _guard = span.enter();

    let old_policy = load_policy(old_path)?;
    let new_policy = load_policy(new_path)?;
    let fixtures = load_fixtures(fixtures_dir)?;
    tracing::info!(count = fixtures.len(), "loaded fixtures");

    let mut rows: Vec<Value> = Vec::new();
    let mut changed_count = 0usize;
    for (name, data) in fixtures {
        let old_outcome = evaluate(&old_policy, data.clone());
        let new_outcome = evaluate(&new_policy, data);
        let changed = old_outcome.status != new_outcome.status;
        if changed {
            changed_count += 1;
        }
        if changed || show_unchanged {
            rows.push(json!({
                "fixture": name,
                "old_status": status_str(old_outcome.status),
                "old_description": old_outcome.status_description,
                "new_status": status_str(new_outcome.status),
                "new_description": new_outcome.status_description,
                "changed": changed,
            }));
        }
    }

    let report = json!({
        "trace_id": trace_id,
        "changed": changed_count,
        "total": rows.len(),
        "results": rows,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::context::{Body, Timestamp};
    use std::collections::{HashMap, HashSet};
    use tempfile::tempdir;

    fn sample_fixture(author: &str) -> StaticPullContextData {
        StaticPullContextData {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 42,
            title: "Add feature".into(),
            author: author.into(),
            head_sha: "c1".into(),
            base_ref: "main".into(),
            head_ref: "feature".into(),
            commits: vec![],
            comments: vec![],
            reviews: vec![],
            body: Body {
                body_text: String::new(),
                created_at: Timestamp(0),
                last_edited_at: Timestamp::ZERO,
                author: author.into(),
            },
            changed_files: vec![],
            labels: HashSet::new(),
            latest_statuses: HashMap::new(),
            latest_workflow_runs: HashMap::new(),
            pushed_at: HashMap::new(),
            team_members: HashMap::new(),
            org_members: HashMap::new(),
            permissions: HashMap::new(),
        }
    }

    #[test]
    fn tightening_requires_count_flips_approved_to_pending() {
        let dir = tempdir().unwrap();
        let old_yaml = "policy:\n  approval: r1\napproval_rules:\n  - name: r1\n    requires: { count: 0 }\n";
        let new_yaml =
            "policy:\n  approval: r1\napproval_rules:\n  - name: r1\n    requires: { count: 1, permissions: [none] }\n";
        fs::write(dir.path().join("old.yaml"), old_yaml).unwrap();
        fs::write(dir.path().join("new.yaml"), new_yaml).unwrap();

        let fixtures_dir = dir.path().join("fixtures");
        fs::create_dir(&fixtures_dir).unwrap();
        let fixture = sample_fixture("alice");
        fs::write(
            fixtures_dir.join("pr1.json"),
            serde_json::to_string(&fixture).unwrap(),
        )
        .unwrap();

        let old_policy = load_policy(&dir.path().join("old.yaml")).unwrap();
        let new_policy = load_policy(&dir.path().join("new.yaml")).unwrap();
        let fixtures = load_fixtures(&fixtures_dir).unwrap();
        assert_eq!(fixtures.len(), 1);

        let (_, data) = fixtures.into_iter().next().unwrap();
        let old_outcome = evaluate(&old_policy, data.clone());
        let new_outcome = evaluate(&new_policy, data);
        assert_eq!(old_outcome.status, Status::Approved);
        assert_eq!(new_outcome.status, Status::Pending);
    }

    #[test]
    fn unchanged_fixtures_are_omitted_unless_requested() {
        let dir = tempdir().unwrap();
        let yaml = "policy:\n  approval: r1\napproval_rules:\n  - name: r1\n    requires: { count: 0 }\n";
        fs::write(dir.path().join("old.yaml"), yaml).unwrap();
        fs::write(dir.path().join("new.yaml"), yaml).unwrap();
        let fixtures_dir = dir.path().join("fixtures");
        fs::create_dir(&fixtures_dir).unwrap();
        fs::write(
            fixtures_dir.join("pr1.json"),
            serde_json::to_string(&sample_fixture("alice")).unwrap(),
        )
        .unwrap();

        cmd_diff(&dir.path().join("old.yaml"), &dir.path().join("new.yaml"), &fixtures_dir, false).unwrap();
    }
}
