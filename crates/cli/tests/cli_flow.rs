//! End-to-end runs of the `dailypaper` binary against a temp home and a
//! mocked embedding service.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TOPICS: [&str; 3] = ["graph", "vision", "speech"];

/// Answers `/api/embed` with one topic-indicator vector per input text.
struct TopicEmbeddings;

impl Respond for TopicEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|text| {
                        let text = text.as_str().unwrap_or_default().to_lowercase();
                        TOPICS
                            .iter()
                            .map(|t| if text.contains(t) { 1.0 } else { 0.0 })
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

struct Env<'a> {
    home: &'a Path,
    embed_url: String,
}

impl Env<'_> {
    fn run(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new(env!("CARGO_BIN_EXE_dailypaper"))
            .args(args)
            .env("DAILYPAPER_HOME", self.home)
            .env_remove("DAILYPAPER_DB")
            .env_remove("DAILYPAPER_STRATEGIES")
            .env_remove("DAILYPAPER_LLM_API_KEY")
            .env("DAILYPAPER_EMBEDDING_URL", &self.embed_url)
            .env("RUST_LOG", "warn")
            .output()
            .with_context(|| format!("failed to run dailypaper {args:?}"))?;
        if cfg!(debug_assertions) {
            eprintln!("dailypaper {args:?} stderr:\n{}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(output)
    }

    fn json(&self, args: &[&str]) -> Result<Value> {
        let output = self.run(args)?;
        assert!(output.status.success(), "dailypaper {args:?} failed: {output:?}");
        serde_json::from_slice(&output.stdout).context("stdout is not JSON")
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn import_profile_recommend_and_evaluate() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(TopicEmbeddings)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir()?;
    let env = Env {
        home: tmp.path(),
        embed_url: format!("{}/api/embed", server.uri()),
    };

    let papers = tmp.path().join("papers.json");
    std::fs::write(
        &papers,
        json!([
            {"source": "arxiv", "source_id": "2401.00001", "title": "Graph transformers",
             "abstract": "Attention for graph data", "published_at": "2024-01-02T00:00:00Z"},
            {"source": "arxiv", "source_id": "2401.00002", "title": "Vision at scale",
             "abstract": "Large vision models", "published_at": "2024-01-03T00:00:00Z"},
            {"source": "arxiv", "source_id": "2401.00003", "title": "Speech and graph",
             "abstract": "Speech recognition with graph priors", "published_at": "2024-01-04T00:00:00Z"}
        ])
        .to_string(),
    )?;

    let imported = env.json(&["import", papers.to_str().unwrap_or_default(), "--format", "json"])?;
    assert_eq!(imported["imported"], 3);

    let profile = env.json(&["profile", "--interested", "graph", "--format", "json"])?;
    assert_eq!(profile["interested_keywords"], "graph");

    let strategies = env.json(&["strategies", "--format", "json"])?;
    assert_eq!(strategies.as_array().map(Vec::len), Some(6));

    let results = env.json(&[
        "recommend",
        "--strategies",
        "keyword_semantic,repetition_filter",
        "--format",
        "json",
    ])?;
    let ids: Vec<i64> = results
        .as_array()
        .context("recommend output is an array")?
        .iter()
        .filter_map(|r| r["paper_id"].as_i64())
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(results[0]["title"], "Graph transformers");

    let marked = env.json(&["mark", "1", "interested", "--notes", "great", "--format", "json"])?;
    assert_eq!(marked["action"], "interested");
    assert_eq!(marked["recommendation_count"], 1);

    let failed = env.run(&["evaluate", "--split-date", "2999-01-01", "--format", "json"])?;
    assert!(!failed.status.success());
    let report: Value = serde_json::from_slice(&failed.stdout)?;
    assert!(report["error"].as_str().is_some_and(|e| e.contains("2999-01-01")));

    Ok(())
}

#[test]
fn themes_refresh_without_llm_key_fails_cleanly() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let env = Env {
        home: tmp.path(),
        embed_url: "http://127.0.0.1:9/api/embed".into(),
    };

    let listed = env.json(&["themes", "--format", "json"])?;
    assert_eq!(listed, json!([]));

    let output = env.run(&["themes", "--refresh"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DAILYPAPER_LLM_API_KEY"));
    Ok(())
}
