//! End-to-end batch scenarios against the local workspace and a recording mock.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tk_batch::{
    BatchService, CodeSearcher, Collaborators, DiffSynthesizer, FileReader, InteractionBatcher,
    PatchWriter, WorkspaceAnalyzer, WorkspaceSummary, BATCH_TOOL, METRICS_TOOL, SHARED_IMPORTS_KEY,
    SHARED_IMPORTS_MARKER,
};
use tk_compactor::MinificationEngine;
use tk_core::{BatchConfig, ReadStrategy, Result, TkError};
use tk_metrics::MetricsTracker;

// ============================================================
// Recording mock
// ============================================================

#[derive(Default)]
struct Recorder {
    calls: AtomicUsize,
    contexts: AtomicUsize,
    patches: Mutex<Vec<String>>,
}

impl Recorder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileReader for Recorder {
    async fn read(&self, path: &str, strategy: ReadStrategy, _s: Option<usize>, _e: Option<usize>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if path.starts_with("missing") {
            return Err(TkError::Other(anyhow::anyhow!("no such file: {path}")));
        }
        Ok(json!({"path": path, "strategy": strategy.to_string(), "content": format!("body of {path}")}))
    }
}

#[async_trait]
impl PatchWriter for Recorder {
    async fn apply(&self, path: &str, patch: &str, _hash: Option<&str>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.patches.lock().unwrap().push(patch.to_string());
        Ok(json!({"success": true, "path": path}))
    }
}

#[async_trait]
impl CodeSearcher for Recorder {
    async fn search(&self, query: &str, directory: &str, _p: Option<&str>, max_results: usize) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"query": query, "directory": directory, "max_results": max_results, "results": []}))
    }
}

#[async_trait]
impl WorkspaceAnalyzer for Recorder {
    async fn summarize(&self, directory: &str, max_depth: usize) -> Result<WorkspaceSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(WorkspaceSummary {
            summary_text: format!("{directory} at depth {max_depth}"),
            key_files: vec!["Cargo.toml".into()],
        })
    }

    async fn extract_context(&self, _directory: &str, focus: &str, max_tokens: usize) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"focus": focus, "max_tokens": max_tokens}))
    }
}

fn mock_batcher(root: &std::path::Path) -> (Arc<Recorder>, InteractionBatcher) {
    let recorder = Arc::new(Recorder::default());
    let batcher = InteractionBatcher::new(
        BatchConfig::default(),
        Collaborators::from_shared(recorder.clone()),
        DiffSynthesizer::new(root),
        Arc::new(MinificationEngine::new()),
    );
    (recorder, batcher)
}

fn local_batcher() -> (TempDir, InteractionBatcher) {
    let tmp = TempDir::new().unwrap();
    let batcher = InteractionBatcher::local(tmp.path(), BatchConfig::default());
    (tmp, batcher)
}

// ============================================================
// Batch size limit
// ============================================================

#[tokio::test]
async fn test_too_many_operations_runs_nothing() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let ops: Vec<Value> = (0..26).map(|i| json!({"type": "read", "path": format!("f{i}.py")})).collect();

    let err = batcher.run_batch(&ops).await.unwrap_err();
    assert!(matches!(err, TkError::TooManyOperations { count: 26, max: 25 }));
    assert_eq!(recorder.calls(), 0);

    let rendered = batcher.run_batch_json(&ops).await;
    assert_eq!(rendered, json!({"error": "Too many operations: 26 > 25"}));
    assert_eq!(recorder.calls(), 0);
}

#[tokio::test]
async fn test_max_operations_accepted() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let ops: Vec<Value> = (0..25).map(|i| json!({"type": "search", "query": format!("q{i}")})).collect();
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.searches.len(), 25);
    assert_eq!(recorder.calls(), 25);
}

// ============================================================
// Grouping and ordering
// ============================================================

#[tokio::test]
async fn test_groups_preserve_submission_order() {
    let tmp = TempDir::new().unwrap();
    let (_recorder, batcher) = mock_batcher(tmp.path());
    let ops = vec![
        json!({"type": "read", "path": "one"}),
        json!({"type": "search", "query": "alpha"}),
        json!({"type": "read", "path": "two"}),
        json!({"type": "search", "query": "beta", "max_results": 3}),
        json!({"type": "read", "path": "three", "strategy": "ast"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    let paths: Vec<&str> = env.reads.iter().map(|r| r["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["one", "two", "three"]);
    assert_eq!(env.reads[2]["strategy"], "ast");
    assert_eq!(env.searches[0]["query"], "alpha");
    assert_eq!(env.searches[0]["max_results"], 10);
    assert_eq!(env.searches[0]["directory"], ".");
    assert_eq!(env.searches[1]["max_results"], 3);
    assert_eq!(env.ops, 5);
    assert!(env.batch);
}

#[tokio::test]
async fn test_unknown_operation_is_reported() {
    let tmp = TempDir::new().unwrap();
    let (_recorder, batcher) = mock_batcher(tmp.path());
    let ops = vec![
        json!({"type": "delete", "path": "x"}),
        json!({"type": "read", "path": "kept"}),
        json!({"path": "untyped"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.reads.len(), 1);
    assert_eq!(env.rejected.len(), 2);
    assert_eq!(env.rejected[0], json!({"index": 0, "error": "Unknown operation type: delete"}));
    assert_eq!(env.rejected[1]["index"], 2);
    assert_eq!(env.ops, 3);
}

#[tokio::test]
async fn test_rejected_omitted_when_empty() {
    let tmp = TempDir::new().unwrap();
    let (_recorder, batcher) = mock_batcher(tmp.path());
    let env = batcher.build_envelope(&[json!({"type": "read", "path": "a"})]).await.unwrap();
    let v = serde_json::to_value(&env).unwrap();
    assert!(v.get("rejected").is_none());
    assert_eq!(v["_batch"], true);
    assert_eq!(v["_ops"], 1);
}

// ============================================================
// Per-operation failures
// ============================================================

#[tokio::test]
async fn test_read_failure_is_local() {
    let tmp = TempDir::new().unwrap();
    let (_recorder, batcher) = mock_batcher(tmp.path());
    let ops = vec![
        json!({"type": "read", "path": "missing.py"}),
        json!({"type": "read", "path": "ok.py"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.reads[0]["path"], "missing.py");
    assert!(env.reads[0]["error"].as_str().unwrap().contains("no such file"));
    assert_eq!(env.reads[1]["content"], "body of ok.py");
}

#[tokio::test]
async fn test_write_without_payload() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let ops = vec![
        json!({"type": "write", "path": "a.txt"}),
        json!({"type": "write", "path": "b.txt", "diff": "--- a/b.txt\n+++ b/b.txt\n@@ -0,0 +1 @@\n+b"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(
        env.writes[0],
        json!({"error": "Write operation requires diff or content", "path": "a.txt"})
    );
    assert_eq!(env.writes[1]["success"], true);
    assert_eq!(recorder.patches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_write_content_synthesizes_patch() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let ops = vec![json!({"type": "write", "path": "new.txt", "content": "hello\nworld"})];
    batcher.build_envelope(&ops).await.unwrap();
    let patches = recorder.patches.lock().unwrap();
    assert_eq!(
        patches[0],
        "--- a/new.txt\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n\\ No newline at end of file"
    );
}

#[tokio::test]
async fn test_explicit_diff_wins_over_content() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let diff = "--- a/x\n+++ b/x\n@@ -0,0 +1 @@\n+from diff";
    let ops = vec![json!({"type": "write", "path": "x", "diff": diff, "content": "ignored"})];
    batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(recorder.patches.lock().unwrap()[0], diff);
}

// ============================================================
// Analyze
// ============================================================

#[tokio::test]
async fn test_analyze_overview_embeds_summary() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let ops = vec![
        json!({"type": "analyze"}),
        json!({"type": "analyze", "directory": "src", "focus": "overview"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.analyses[0]["summary"], ". at depth 3");
    assert_eq!(
        env.analyses[0]["context"],
        json!({"summary": ". at depth 3", "key_files": ["Cargo.toml"]})
    );
    assert_eq!(env.analyses[1]["summary"], "src at depth 3");
    assert_eq!(recorder.contexts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_analyze_focus_extracts_context() {
    let tmp = TempDir::new().unwrap();
    let (recorder, batcher) = mock_batcher(tmp.path());
    let env = batcher
        .build_envelope(&[json!({"type": "analyze", "focus": "auth"})])
        .await
        .unwrap();
    assert_eq!(env.analyses[0]["context"], json!({"focus": "auth", "max_tokens": 4000}));
    assert_eq!(recorder.contexts.load(Ordering::SeqCst), 1);
}

// ============================================================
// Local filesystem scenarios
// ============================================================

#[tokio::test]
async fn test_shared_import_scenario() {
    let (tmp, batcher) = local_batcher();
    std::fs::write(tmp.path().join("a.py"), "import os\n\ndef a():\n    pass\n").unwrap();
    std::fs::write(tmp.path().join("b.py"), "import os\n\ndef b():\n    pass\n").unwrap();
    let ops = vec![
        json!({"type": "read", "path": "a.py"}),
        json!({"type": "read", "path": "b.py"}),
    ];

    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.shared.len(), 1);
    assert_eq!(env.shared[SHARED_IMPORTS_KEY], "import os");
    for read in &env.reads {
        let content = read["content"].as_str().unwrap();
        assert!(content.starts_with(SHARED_IMPORTS_MARKER));
        assert!(!content.contains("import os"));
    }

    let response = batcher.run_batch(&ops).await.unwrap();
    let payload: Value = serde_json::from_str(&response.payload).unwrap();
    assert_eq!(payload["shared"]["_shared_imports"], "import os");
    assert_eq!(response.format, "json");
    assert!(response.tokens.original >= response.tokens.minified);
    assert!(!response.client_instruction.is_empty());
}

#[tokio::test]
async fn test_write_new_file_scenario() {
    let (tmp, batcher) = local_batcher();
    let ops = vec![json!({"type": "write", "path": "new.txt", "content": "hello\nworld"})];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.writes[0]["success"], true);
    assert_eq!(env.writes[0]["lines_added"], 2);
    assert_eq!(env.writes[0]["lines_removed"], 0);
    assert_eq!(std::fs::read_to_string(tmp.path().join("new.txt")).unwrap(), "hello\nworld");
}

#[tokio::test]
async fn test_write_existing_file_roundtrip() {
    let (tmp, batcher) = local_batcher();
    std::fs::write(tmp.path().join("cfg.toml"), "a = 1\nb = 2\nc = 3").unwrap();
    let desired = "a = 1\nb = 20\nc = 3\nd = 4";
    let ops = vec![json!({"type": "write", "path": "cfg.toml", "content": desired})];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.writes[0]["hunks"], 1);
    assert_eq!(std::fs::read_to_string(tmp.path().join("cfg.toml")).unwrap(), desired);
}

#[tokio::test]
async fn test_write_keeps_trailing_newline_state() {
    let (tmp, batcher) = local_batcher();
    std::fs::write(tmp.path().join("a.txt"), "a\n").unwrap();
    std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
    let ops = vec![
        json!({"type": "write", "path": "main.rs", "content": "fn main() {}\n"}),
        json!({"type": "write", "path": "a.txt", "content": "b"}),
        json!({"type": "write", "path": "b.txt", "content": "b\n"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert!(env.writes.iter().all(|w| w["success"] == true), "{:?}", env.writes);
    let on_disk = |name: &str| std::fs::read_to_string(tmp.path().join(name)).unwrap();
    assert_eq!(on_disk("main.rs"), "fn main() {}\n");
    assert_eq!(on_disk("a.txt"), "b");
    assert_eq!(on_disk("b.txt"), "b\n");
}

#[tokio::test]
async fn test_write_unchanged_content_reports_missing_payload() {
    let (tmp, batcher) = local_batcher();
    std::fs::write(tmp.path().join("a.txt"), "same").unwrap();
    let ops = vec![
        json!({"type": "write", "path": "a.txt", "content": "same"}),
        json!({"type": "write", "path": "absent.txt", "content": ""}),
        json!({"type": "write", "path": "c.txt", "diff": ""}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    for (slot, path) in env.writes.iter().zip(["a.txt", "absent.txt", "c.txt"]) {
        assert_eq!(
            slot,
            &json!({"error": "Write operation requires diff or content", "path": path})
        );
    }
    assert!(!tmp.path().join("absent.txt").exists());
    assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "same");
}

#[tokio::test]
async fn test_paths_outside_workspace_are_rejected() {
    let outer = TempDir::new().unwrap();
    let root = outer.path().join("ws");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(outer.path().join("secret.txt"), "keep").unwrap();
    let batcher = InteractionBatcher::local(&root, BatchConfig::default());
    let escape = outer.path().join("escape.txt");
    let ops = vec![
        json!({"type": "read", "path": "../secret.txt"}),
        json!({"type": "write", "path": "../escape.txt", "content": "x"}),
        json!({"type": "write", "path": escape.to_string_lossy(), "diff": "@@ -0,0 +1 @@\n+x"}),
        json!({"type": "search", "query": "keep", "directory": ".."}),
        json!({"type": "analyze", "directory": "../"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert!(env.reads[0]["error"].as_str().unwrap().contains("escapes workspace root"));
    assert!(env.writes[0]["error"].as_str().unwrap().contains("escapes workspace root"));
    assert!(env.writes[1]["error"].as_str().unwrap().contains("escapes workspace root"));
    assert!(env.searches[0]["error"].is_string());
    assert!(env.analyses[0]["error"].is_string());
    assert!(!escape.exists());
}

#[tokio::test]
async fn test_reads_see_state_before_writes() {
    let (tmp, batcher) = local_batcher();
    std::fs::write(tmp.path().join("a.txt"), "old").unwrap();
    let ops = vec![
        json!({"type": "write", "path": "a.txt", "content": "new"}),
        json!({"type": "read", "path": "a.txt", "strategy": "full"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.reads[0]["content"], "old");
    assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "new");
}

#[tokio::test]
async fn test_mixed_local_batch() {
    let (tmp, batcher) = local_batcher();
    std::fs::create_dir_all(tmp.path().join("src")).unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[package]\nname = \"demo\"").unwrap();
    std::fs::write(tmp.path().join("src/main.rs"), "fn main() {\n    start_server();\n}").unwrap();
    let ops = vec![
        json!({"type": "read", "path": "src/main.rs"}),
        json!({"type": "search", "query": "start_server"}),
        json!({"type": "analyze", "focus": "server"}),
        json!({"type": "read", "path": "missing.rs"}),
    ];
    let env = batcher.build_envelope(&ops).await.unwrap();
    assert_eq!(env.reads[0]["strategy"], "full");
    assert!(env.reads[1]["error"].is_string());
    assert_eq!(env.reads[1]["path"], "missing.rs");
    assert_eq!(env.searches[0]["results"][0]["path"], "src/main.rs");
    assert_eq!(env.analyses[0]["context"]["files"][0]["path"], "src/main.rs");
    assert!(env.shared.is_empty());
}

// ============================================================
// Metrics wiring
// ============================================================

#[tokio::test]
async fn test_service_records_batch_call() {
    let (tmp, batcher) = local_batcher();
    std::fs::write(tmp.path().join("a.py"), "import os\nprint(1)").unwrap();
    let metrics = Arc::new(MetricsTracker::in_memory());
    let service = BatchService::new(batcher, metrics.clone());

    let result = service.run(&[json!({"type": "read", "path": "a.py"})]).await;
    let original = result["tokens"]["original"].as_u64().unwrap();
    let minified = result["tokens"]["minified"].as_u64().unwrap();

    let snap = metrics.snapshot();
    let tool = &snap.tools[BATCH_TOOL];
    assert_eq!(tool.calls, 1);
    assert_eq!(tool.tokens_saved, original.saturating_sub(minified));
    assert!(tool.input_tokens > 0);
    assert!(tool.output_tokens > 0);
    assert_eq!(snap.totals.calls, 1);
}

#[tokio::test]
async fn test_service_records_fatal_batch() {
    let (_tmp, batcher) = local_batcher();
    let metrics = Arc::new(MetricsTracker::in_memory());
    let service = BatchService::new(batcher, metrics.clone());
    let ops: Vec<Value> = (0..30).map(|_| json!({"type": "analyze"})).collect();
    let result = service.run(&ops).await;
    assert_eq!(result, json!({"error": "Too many operations: 30 > 25"}));
    assert_eq!(metrics.snapshot().tools[BATCH_TOOL].tokens_saved, 0);
}

#[tokio::test]
async fn test_metrics_report() {
    let (_tmp, batcher) = local_batcher();
    let metrics = Arc::new(MetricsTracker::in_memory());
    metrics.record_model_use("model-x", 1.0);
    let service = BatchService::new(batcher, metrics.clone());
    let report = service.metrics_report();
    assert_eq!(report["session"]["models"]["model-x"]["calls"], 1);
    assert_eq!(metrics.snapshot().tools[METRICS_TOOL].calls, 1);
}
