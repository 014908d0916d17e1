use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use schemalink_core::{SchemaGraph, summarize, validate_graph};
use schemalink_introspect::Discovery;

use super::{RegistryError, RegistryResult};
use crate::config::SchemalinkConfig;

/// Serializable options for runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub schemas: Option<Vec<String>>,
    pub config_path: Option<PathBuf>,
    pub settings: SchemalinkConfig,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub engine: String,
    pub format_version: String,
    pub run_dir: PathBuf,
    pub out: Option<PathBuf>,
    pub options: RunOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub engine: String,
    pub format_version: String,
    pub options: RunOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub snapshot_path: PathBuf,
    pub warnings_path: PathBuf,
    pub summary_path: PathBuf,
    pub logs_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        engine: ctx.engine.clone(),
        format_version: ctx.format_version.clone(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        snapshot_path: root.join("snapshot.json"),
        warnings_path: root.join("warnings.json"),
        summary_path: root.join("summary.json"),
        logs_path,
        root,
    })
}

/// Write snapshot, warnings and summary of a discovery into the run directory, and
/// the snapshot to `out_path` as well when given.
pub fn write_discovery(
    paths: &RunPaths,
    discovery: &Discovery,
    out_path: Option<&Path>,
) -> RegistryResult<()> {
    write_json(&paths.snapshot_path, &discovery.graph)?;
    write_json(&paths.warnings_path, &discovery.warnings)?;
    write_json(&paths.summary_path, &summarize(&discovery.graph))?;

    if let Some(out_path) = out_path {
        write_json_to(out_path, &discovery.graph)?;
    }

    Ok(())
}

/// Write `value` as pretty JSON, creating parent directories.
fn write_json_to<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    write_json(path, value)
}

/// Load a snapshot file and check it before use.
pub fn read_snapshot(path: &Path) -> RegistryResult<SchemaGraph> {
    let file = OpenOptions::new().read(true).open(path)?;
    let graph: SchemaGraph = serde_json::from_reader(std::io::BufReader::new(file))?;

    let invalid = |reason: String| RegistryError::InvalidSnapshot {
        path: path.display().to_string(),
        reason,
    };
    if graph.format_version() != schemalink_core::SNAPSHOT_FORMAT_VERSION {
        return Err(invalid(format!(
            "format version {} is not supported",
            graph.format_version()
        )));
    }
    validate_graph(&graph).map_err(|err| invalid(err.to_string()))?;

    Ok(graph)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemalink_core::{RawCatalog, RawColumnRow};
    use schemalink_introspect::{DiscoverOptions, MemorySource, discover};
    use uuid::Uuid;

    fn context(run_dir: PathBuf) -> RunContext {
        RunContext {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            engine: "memory".to_string(),
            format_version: schemalink_core::SNAPSHOT_FORMAT_VERSION.to_string(),
            run_dir,
            out: None,
            options: RunOptions {
                schemas: None,
                config_path: None,
                settings: SchemalinkConfig::default(),
            },
        }
    }

    #[tokio::test]
    async fn run_artifacts_round_trip() {
        let run_dir = std::env::temp_dir().join(format!("schemalink-test-{}", Uuid::new_v4()));
        let paths = start_run(&context(run_dir.clone())).expect("start run");
        assert!(paths.root.join("config.json").exists());
        assert!(paths.logs_path.exists());

        let catalog = RawCatalog {
            columns: vec![RawColumnRow {
                table: "accounts".to_string(),
                column: Some("id".to_string()),
                data_type: "integer".to_string(),
                ..RawColumnRow::default()
            }],
            primary_keys: Vec::new(),
        };
        let discovery = discover(&MemorySource::new(catalog, Vec::new()), &DiscoverOptions::default())
            .await
            .expect("discover");

        write_discovery(&paths, &discovery, None).expect("write discovery");
        let loaded = read_snapshot(&paths.snapshot_path).expect("read snapshot");
        assert_eq!(loaded.version(), discovery.graph.version());
        assert!(paths.summary_path.exists());
        assert!(paths.warnings_path.exists());

        std::fs::remove_dir_all(run_dir).expect("cleanup");
    }
}
