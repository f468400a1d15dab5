//! End-to-end batch runs: discovery, conversion on the worker pool, cleanup
//! of the source tree and the run report.

use std::path::PathBuf;
use std::time::Duration;

use converter::batch::run_batch;
use converter::convert::ConvertOptions;
use converter::core::types::{ConversionStatus, ConvertMode};
use converter::discover::discover_tasks;
use converter::io::report::write_report;
use converter::test_support::{ScriptedOutcome, ScriptedTool, TestProject};

fn options() -> ConvertOptions {
    ConvertOptions {
        mode: ConvertMode::Replace,
        prefabs_folder: PathBuf::from("Prefabs"),
        tool_timeout: Duration::from_secs(5),
        output_limit_bytes: 10_000,
        settle_delay: Duration::ZERO,
        tool_log_dir: None,
    }
}

/// Layout:
/// ```text
/// in/
/// ├── bob - Snake.yyz
/// ├── Maze/
/// │   ├── bob - Maze.yyp
/// │   ├── sprites/spr.yy
/// │   ├── mvc/
/// │   ├── music/theme.ogg
/// │   └── README.md
/// └── Racer/Racer.project.gmx   (tool fails)
/// ```
#[test]
fn batch_converts_into_output_tree_and_reports_failures() {
    let project = TestProject::new().expect("project");
    project.file("in/bob - Snake.yyz", "zip").expect("package");
    project.file("in/Maze/bob - Maze.yyp", "{}").expect("yyp");
    project.file("in/Maze/sprites/spr.yy", "{}").expect("sprite");
    project.dir("in/Maze/mvc").expect("mvc");
    project.file("in/Maze/music/theme.ogg", "ogg").expect("music");
    project.file("in/Maze/README.md", "readme").expect("readme");
    project
        .file("in/Racer/Racer.project.gmx", "<project/>")
        .expect("gmx");
    let input = project.path().join("in");
    let output = project.dir("out").expect("out");

    let tasks = discover_tasks(&input, &output).expect("discover");
    assert_eq!(tasks.len(), 3);

    let tool = ScriptedTool::new(ScriptedOutcome::Succeed)
        .with_override("Racer", ScriptedOutcome::Fail);
    let report = run_batch(&tasks, &tool, &options(), 2).expect("batch");

    assert_eq!(report.total, 3);
    assert_eq!(report.converted, 2);
    assert_eq!(report.failed, 1);
    let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ConversionStatus::Converted,
            ConversionStatus::Converted,
            ConversionStatus::RolledBack,
        ]
    );

    let out: Vec<String> = project
        .snapshot()
        .expect("snapshot")
        .into_iter()
        .filter(|path| path.starts_with("out/"))
        .collect();
    assert_eq!(
        out,
        vec![
            "out/",
            "out/Maze/",
            "out/Maze/Maze.yyp",
            "out/Maze/README.md",
            "out/Maze/music/",
            "out/Maze/music/theme.ogg",
            "out/Maze/objects/",
            "out/Maze/objects/obj_player/",
            "out/bob - Snake/",
            "out/bob - Snake/Snake.yyp",
            "out/bob - Snake/objects/",
            "out/bob - Snake/objects/obj_player/",
        ]
    );

    // Sources stay; temp copies and the transient mvc folder are gone.
    assert!(project.path().join("in/bob - Snake.yyz").is_file());
    assert!(!project.path().join("in/Snake.yyz").exists());
    assert!(project.path().join("in/Maze/bob - Maze.yyp").is_file());
    assert!(!project.path().join("in/Maze/Maze.yyp").exists());
    assert!(!project.path().join("in/Maze/mvc").exists());
    assert!(project.path().join("in/Racer/Racer.project.gmx").is_file());

    let mut sources: Vec<PathBuf> = tool.calls().into_iter().map(|c| c.source).collect();
    sources.sort();
    assert_eq!(
        sources,
        vec![
            input.join("Maze/Maze.yyp"),
            input.join("Racer/Racer.project.gmx"),
            input.join("Snake.yyz"),
        ]
    );

    let report_path = project.path().join("report.json");
    write_report(&report_path, &report).expect("report");
    let json: serde_json::Value =
        serde_json::from_str(&project.read("report.json").expect("read")).expect("parse");
    assert_eq!(json["failed"], 1);
    assert_eq!(json["results"][2]["status"], "rolled_back");
}

/// Projects that already carry the shortened name are converted themselves
/// and never serve as a temp copy for their prefixed twin.
#[test]
fn projects_at_the_shortened_name_are_never_overwritten() {
    let project = TestProject::new().expect("project");
    project.file("in/Snake.yyz", "real package").expect("package");
    project.file("in/bob - Snake.yyz", "prefixed package").expect("package");
    project.file("in/Maze/Maze.yyp", "real project").expect("yyp");
    project.file("in/Maze/bob - Maze.yyp", "prefixed project").expect("yyp");
    let input = project.path().join("in");
    let output = project.dir("out").expect("out");

    let tasks = discover_tasks(&input, &output).expect("discover");
    let tool = ScriptedTool::new(ScriptedOutcome::Succeed);
    let report = run_batch(&tasks, &tool, &options(), 2).expect("batch");

    let outcomes: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.source.clone(), r.status))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (input.join("Snake.yyz"), ConversionStatus::Converted),
            (input.join("bob - Snake.yyz"), ConversionStatus::Failed),
            (input.join("Maze/Maze.yyp"), ConversionStatus::Converted),
            (input.join("Maze/bob - Maze.yyp"), ConversionStatus::Failed),
        ]
    );
    assert!(
        report.results[1]
            .reason
            .as_deref()
            .expect("reason")
            .contains("already exists")
    );
    assert!(
        report.results[3]
            .reason
            .as_deref()
            .expect("reason")
            .contains("already converted")
    );

    assert_eq!(project.read("in/Snake.yyz").expect("read"), "real package");
    assert_eq!(project.read("in/Maze/Maze.yyp").expect("read"), "real project");
    assert_eq!(
        project.read("in/Maze/bob - Maze.yyp").expect("read"),
        "prefixed project"
    );
    assert!(!project.path().join("out/bob - Snake").exists());
    assert!(project.path().join("out/Maze/Maze.yyp").is_file());

    let mut sources: Vec<PathBuf> = tool.calls().into_iter().map(|c| c.source).collect();
    sources.sort();
    assert_eq!(
        sources,
        vec![input.join("Maze/Maze.yyp"), input.join("Snake.yyz")]
    );
}
