//! Remediation planner
//!
//! Turns each detected column change into a suggested edit for the
//! transformation script. Columns are processed concurrently and in
//! isolation: a failed request for one column is recorded in that column's
//! recommendation and never touches the others.

use crate::config::PlannerConfig;
use crate::error::{AppError, AppResult};
use crate::pipeline::gateway::{GatewayHandle, GenerationOptions};
use crate::snapshot::{ChangeRecord, ChangeSet};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Prefix of every recommendation that was not produced by the backend
pub const LLM_ERROR_MARKER: &str = "[LLM error]";

/// Column name -> recommendation text
pub type RecommendationMap = BTreeMap<String, String>;

/// Whether a recommendation records a failure rather than a suggestion
pub fn is_failure(recommendation: &str) -> bool {
    recommendation.starts_with(LLM_ERROR_MARKER)
}

/// Read the transformation script; a missing file yields an empty context
pub fn load_script_context(path: &Path) -> AppResult<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No transformation script at {}, using empty context", path.display());
            Ok(String::new())
        }
        Err(e) => Err(AppError::Io(e)),
    }
}

pub struct RemediationPlanner {
    gateway: GatewayHandle,
    options: GenerationOptions,
    max_concurrency: usize,
    request_timeout: Duration,
}

impl RemediationPlanner {
    pub fn new(gateway: GatewayHandle, options: GenerationOptions, config: &PlannerConfig) -> Self {
        Self {
            gateway,
            options,
            max_concurrency: config.max_concurrency.max(1),
            request_timeout: config.request_timeout,
        }
    }

    /// Produce one recommendation per changed column
    pub async fn plan(&self, changes: &ChangeSet, script_context: &str) -> RecommendationMap {
        info!(
            "Planning remediation for {} column(s) via {:?}",
            changes.len(),
            self.gateway
        );

        let script: Arc<str> = Arc::from(script_context);
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (column, record) in changes.iter() {
            let column = column.clone();
            let record = record.clone();
            let script = Arc::clone(&script);
            let permits = Arc::clone(&permits);
            let gateway = self.gateway.clone();
            let options = self.options.clone();
            let timeout = self.request_timeout;

            tasks.spawn(async move {
                let prompt = build_prompt(&column, &record, &script);
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(timeout, gateway.generate(&prompt, &options)).await {
                            Ok(result) => result,
                            Err(_) => Err(AppError::Timeout(timeout)),
                        }
                    }
                    Err(_) => Err(AppError::Generation("planner shut down".to_string())),
                };
                let recommendation = settle(&column, &record, outcome);
                (column, recommendation)
            });
        }

        let mut recommendations = RecommendationMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((column, recommendation)) => {
                    recommendations.insert(column, recommendation);
                }
                Err(e) => warn!("Remediation task aborted: {}", e),
            }
        }

        // Aborted tasks lose their column name; restore the key with a marker
        for (column, record) in changes.iter() {
            if !recommendations.contains_key(column) {
                let recommendation = failure_marker(
                    column,
                    record,
                    &AppError::Generation("remediation task aborted".to_string()),
                );
                recommendations.insert(column.clone(), recommendation);
            }
        }

        let failed = recommendations.values().filter(|r| is_failure(r)).count();
        info!(
            "Remediation planned: {} generated, {} failed",
            recommendations.len() - failed,
            failed
        );

        recommendations
    }
}

fn settle(column: &str, record: &ChangeRecord, outcome: AppResult<String>) -> String {
    match outcome {
        Ok(text) => {
            debug!("Recommendation generated for column {}", column);
            text.trim().to_string()
        }
        Err(e) => {
            warn!("Recommendation for column {} failed: {}", column, e);
            failure_marker(column, record, &e)
        }
    }
}

fn failure_marker(column: &str, record: &ChangeRecord, error: &AppError) -> String {
    format!(
        "{} {}: {} Suggested manual fix: {}",
        LLM_ERROR_MARKER,
        error.code(),
        error,
        record.manual_suggestion(column)
    )
}

/// Count quoted references (`'col'` or `"col"`) to a column in the script
pub fn count_references(script: &str, column: &str) -> usize {
    let pattern = format!(r#"["']{}["']"#, regex::escape(column));
    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(script).count(),
        Err(_) => 0,
    }
}

/// Build the prompt for one changed column
pub fn build_prompt(column: &str, record: &ChangeRecord, script: &str) -> String {
    let mut prompt = String::from(
        "You maintain a data transformation script whose input schema has drifted.\n\n",
    );

    prompt.push_str("Current transformation script:\n```\n");
    prompt.push_str(script);
    prompt.push_str("\n```\n\n");

    prompt.push_str(&format!("Column: {}\n", column));
    prompt.push_str(&format!("Change type: {}\n", record.change_type()));
    if let Some(old_type) = record.old_type() {
        prompt.push_str(&format!("Previous type: {}\n", old_type));
    }
    if let Some(new_type) = record.new_type() {
        prompt.push_str(&format!("New type: {}\n", new_type));
    }
    prompt.push_str(&format!(
        "Quoted references in the script: {}\n\n",
        count_references(script, column)
    ));

    prompt.push_str(&record.instruction(column));
    prompt.push_str("\nRespond with a concise code modification suggestion only.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::RecommendationGateway;
    use crate::snapshot::{Drift, DriftDetector, SchemaSnapshot};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers based on the `Column:` line of the prompt
    struct StubGateway {
        fail_column: Option<&'static str>,
        slow_column: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl StubGateway {
        fn new() -> Self {
            Self {
                fail_column: None,
                slow_column: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    fn column_of(prompt: &str) -> String {
        prompt
            .lines()
            .find_map(|line| line.strip_prefix("Column: "))
            .unwrap_or_default()
            .to_string()
    }

    #[async_trait]
    impl RecommendationGateway for StubGateway {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let column = column_of(prompt);
            if Some(column.as_str()) == self.slow_column {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if Some(column.as_str()) == self.fail_column {
                return Err(AppError::Generation("connection reset".to_string()));
            }
            Ok(format!("  update handling of {}  \n", column))
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            model: "stub".to_string(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    fn sample_changes() -> ChangeSet {
        let previous: SchemaSnapshot =
            [("id", "int"), ("name", "string"), ("age", "int"), ("legacy", "string")]
                .into_iter()
                .collect();
        let current: SchemaSnapshot =
            [("id", "int"), ("name", "string"), ("age", "float"), ("email", "string")]
                .into_iter()
                .collect();
        match DriftDetector::detect(&previous, &current) {
            Drift::Detected(changes) => changes,
            Drift::NoDrift => panic!("expected drift"),
        }
    }

    fn planner(gateway: GatewayHandle, timeout: Duration) -> RemediationPlanner {
        RemediationPlanner::new(
            gateway,
            options(),
            &PlannerConfig {
                max_concurrency: 2,
                request_timeout: timeout,
            },
        )
    }

    #[tokio::test]
    async fn test_plan_covers_every_changed_column() {
        let changes = sample_changes();
        let planner = planner(GatewayHandle::ready(StubGateway::new()), Duration::from_secs(1));

        let recommendations = planner.plan(&changes, "df['age'] + 1").await;

        let expected: Vec<&String> = changes.columns().collect();
        assert_eq!(recommendations.keys().collect::<Vec<_>>(), expected);
        assert_eq!(recommendations["age"], "update handling of age");
        assert!(recommendations.values().all(|r| !is_failure(r)));
    }

    #[tokio::test]
    async fn test_one_failure_is_isolated() {
        let changes = sample_changes();
        let gateway = StubGateway {
            fail_column: Some("email"),
            ..StubGateway::new()
        };
        let recommendations = planner(GatewayHandle::ready(gateway), Duration::from_secs(1))
            .plan(&changes, "")
            .await;

        assert_eq!(recommendations.len(), 3);
        assert!(is_failure(&recommendations["email"]));
        assert!(recommendations["email"].contains("connection reset"));
        assert!(recommendations["email"]
            .ends_with("Consider adding handling for new column 'email' in the transformation script."));
        assert_eq!(recommendations["age"], "update handling of age");
        assert_eq!(recommendations["legacy"], "update handling of legacy");
    }

    #[tokio::test]
    async fn test_timeout_is_a_column_failure() {
        let changes = sample_changes();
        let gateway = StubGateway {
            slow_column: Some("age"),
            ..StubGateway::new()
        };
        let recommendations = planner(GatewayHandle::ready(gateway), Duration::from_millis(50))
            .plan(&changes, "")
            .await;

        assert!(recommendations["age"].starts_with("[LLM error] TIMEOUT"));
        assert!(!is_failure(&recommendations["email"]));
    }

    #[tokio::test]
    async fn test_unavailable_gateway_marks_every_column() {
        let changes = sample_changes();
        let recommendations = planner(
            GatewayHandle::Unavailable("Missing required environment variable: GROQ_API_KEY".to_string()),
            Duration::from_secs(1),
        )
        .plan(&changes, "")
        .await;

        assert_eq!(recommendations.len(), changes.len());
        for recommendation in recommendations.values() {
            assert!(recommendation.starts_with("[LLM error] CONFIG_ERROR"));
            assert!(recommendation.contains("GROQ_API_KEY"));
        }
    }

    /// Panics for one column, answers for the rest
    struct PanickingGateway;

    #[async_trait]
    impl RecommendationGateway for PanickingGateway {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> AppResult<String> {
            if column_of(prompt) == "boom" {
                panic!("backend client bug");
            }
            Ok("fine".to_string())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicking_task_keeps_its_column() {
        let previous: SchemaSnapshot = [("a", "int")].into_iter().collect();
        let current: SchemaSnapshot = [("boom", "int"), ("ok", "string")].into_iter().collect();
        let changes = match DriftDetector::detect(&previous, &current) {
            Drift::Detected(changes) => changes,
            Drift::NoDrift => panic!("expected drift"),
        };

        let recommendations = planner(GatewayHandle::ready(PanickingGateway), Duration::from_secs(1))
            .plan(&changes, "")
            .await;

        assert_eq!(
            recommendations.keys().collect::<Vec<_>>(),
            changes.columns().collect::<Vec<_>>()
        );
        assert!(is_failure(&recommendations["boom"]));
        assert!(recommendations["boom"].contains("remediation task aborted"));
        assert_eq!(recommendations["a"], "fine");
        assert_eq!(recommendations["ok"], "fine");
    }

    #[tokio::test]
    async fn test_each_column_calls_gateway_once() {
        let changes = sample_changes();
        let gateway = StubGateway::new();
        let calls = Arc::clone(&gateway.calls);
        planner(GatewayHandle::ready(gateway), Duration::from_secs(1))
            .plan(&changes, "")
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), changes.len());
    }

    #[test]
    fn test_prompt_embeds_script_and_change() {
        let record = ChangeRecord::TypeChanged {
            old_type: "int".into(),
            new_type: "float".into(),
        };
        let script = "df[\"full_name\"] = df[\"name\"] + \" processed\"\nage = df['age']";
        let prompt = build_prompt("age", &record, script);

        assert!(prompt.contains(script));
        assert!(prompt.contains("Column: age\n"));
        assert!(prompt.contains("Change type: type_change\n"));
        assert!(prompt.contains("Previous type: int\n"));
        assert!(prompt.contains("New type: float\n"));
        assert!(prompt.contains("Quoted references in the script: 1\n"));
        assert!(prompt.contains("cast or convert column 'age'"));
    }

    #[test]
    fn test_prompt_with_empty_script_and_added_column() {
        let record = ChangeRecord::Added { new_type: "string".into() };
        let prompt = build_prompt("email", &record, "");

        assert!(prompt.contains("```\n\n```"));
        assert!(!prompt.contains("Previous type"));
        assert!(prompt.contains("New type: string\n"));
        assert!(prompt.contains("add handling for the new column 'email'"));
    }

    #[test]
    fn test_count_references_escapes_column_names() {
        let script = r#"df["a.b"] + df['a.b'] + df["aXb"] + df[a.b]"#;
        assert_eq!(count_references(script, "a.b"), 2);
        assert_eq!(count_references(script, "missing"), 0);
    }

    #[test]
    fn test_missing_script_is_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let context = load_script_context(&dir.path().join("transform.py")).unwrap();
        assert_eq!(context, "");
    }
}
