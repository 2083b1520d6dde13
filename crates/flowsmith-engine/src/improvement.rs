//! Code-improvement rounds over workflow artifacts.
//!
//! A round reads the artifact, asks a provider for an improved version,
//! strips the markdown fence from the reply, overwrites the file and then
//! tries to deploy it. Deployment is best effort: its outcome is kept in a
//! [`DeploymentNote`] and never changes the analysis status.

use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};

use flowsmith_artifacts::{ArtifactError, ArtifactQuery, ArtifactResolver};
use flowsmith_config::ImprovementConfig;
use flowsmith_deploy::DeploymentDispatcher;
use flowsmith_llm::{ChatRequest, ProviderOutcome, ProviderRegistry};
use flowsmith_store::{AnalysisRecord, DeploymentNote, Record, RecordStore};
use flowsmith_utils::atomic_write::write_file_atomic;

use crate::context::build_context;
use crate::error::EngineError;
use crate::lifecycle::parse_id;
use crate::locks::PathLocks;

const PROMPT_HEADER: &str = "Improve the following Python code of a Metaflow workflow:";
const PROMPT_INSTRUCTIONS: &str = "Specific requests:";
const PROMPT_FOOTER: &str =
    "REMEMBER: reply ONLY with the improved Python code, without comments or explanations.";

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

/// Caller input for a round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImproveRequest {
    pub query: ArtifactQuery,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub instructions: Option<String>,
    /// Replaces the configured system prompt
    pub system_prompt: Option<String>,
}

/// The user prompt sent for one round
#[must_use]
pub fn build_improvement_prompt(content: &str, instructions: Option<&str>) -> String {
    let mut parts = vec![PROMPT_HEADER, "", "```python", content, "```"];
    if let Some(instructions) = instructions.filter(|i| !i.trim().is_empty()) {
        parts.extend(["", PROMPT_INSTRUCTIONS, instructions]);
    }
    parts.extend(["", PROMPT_FOOTER]);
    parts.join("\n")
}

/// Remove one leading fence and one trailing fence, then trim.
///
/// Text after the opening fence counts as a language tag only when it is a
/// single identifier that ends its line; otherwise it is code.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.split_once('\n') {
            Some((tag, code)) if is_fence_tag(tag.trim_end()) => code,
            _ => rest,
        };
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim().to_string()
}

fn is_fence_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.'))
}

/// Workflow id for deployment namespacing: the directory directly under the
/// artifact root, else the nearest UUID-shaped path segment
fn infer_workflow_id(root: &Utf8Path, path: &Utf8Path) -> Option<String> {
    if let Ok(relative) = path.strip_prefix(root) {
        let segments: Vec<&str> = relative.iter().collect();
        if let [workflow_id, _, ..] = segments.as_slice() {
            return Some((*workflow_id).to_string());
        }
    }
    path.parent()?
        .iter()
        .rev()
        .find(|segment| UUID_SEGMENT.is_match(segment))
        .map(str::to_string)
}

/// Runs code-improvement rounds and keeps their analyses
pub struct CodeImprovementRound {
    store: RecordStore,
    registry: Arc<ProviderRegistry>,
    resolver: ArtifactResolver,
    settings: ImprovementConfig,
    deployer: Option<Arc<DeploymentDispatcher>>,
    locks: PathLocks,
}

impl CodeImprovementRound {
    #[must_use]
    pub fn new(
        store: RecordStore,
        registry: Arc<ProviderRegistry>,
        resolver: ArtifactResolver,
        settings: ImprovementConfig,
    ) -> Self {
        Self {
            store,
            registry,
            resolver,
            settings,
            deployer: None,
            locks: PathLocks::new(),
        }
    }

    /// Deploy every successful rewrite through `deployer`
    #[must_use]
    pub fn with_deployer(mut self, deployer: Arc<DeploymentDispatcher>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    /// Share rewrite locks with other rounds in this process
    #[must_use]
    pub fn with_locks(mut self, locks: PathLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Resolve the artifact and persist a `pending` analysis.
    ///
    /// Resolution failures are returned as errors and nothing is persisted.
    pub fn create(&self, request: &ImproveRequest) -> Result<AnalysisRecord, EngineError> {
        let resolved = self.resolver.resolve(&request.query)?;
        let provider = request
            .provider
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.registry.default_provider().to_string());
        let model = match request.model.clone().filter(|m| !m.trim().is_empty()) {
            Some(model) => model,
            None => self
                .registry
                .effective_model(&provider, &ChatRequest::default())
                .unwrap_or_default(),
        };
        let system_prompt = request
            .system_prompt
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.settings.system_prompt.clone());

        let mut analysis =
            AnalysisRecord::new(resolved.path.as_str(), provider, model, system_prompt);
        analysis.workflow_id = resolved
            .workflow_id
            .or_else(|| infer_workflow_id(self.resolver.root(), &resolved.path));
        analysis.user_instructions = request
            .instructions
            .clone()
            .filter(|i| !i.trim().is_empty());
        self.store.save(&analysis)?;
        info!(
            analysis_id = %analysis.id,
            path = %analysis.file_path,
            workflow_id = ?analysis.workflow_id,
            "Created analysis"
        );
        Ok(analysis)
    }

    /// Run one round on a `pending` analysis.
    ///
    /// A provider failure or an empty reply leaves the file untouched and the
    /// analysis `failed`. A vanished artifact is persisted as `failed` and
    /// also returned as [`ArtifactError::Unreadable`].
    pub async fn run(&self, mut analysis: AnalysisRecord) -> Result<AnalysisRecord, EngineError> {
        let key = analysis.key();
        let path = Utf8Path::new(&analysis.file_path).to_path_buf();
        let _guard = self.locks.lock(&path).await;

        analysis.result.start(AnalysisRecord::COLLECTION, &key)?;
        analysis.touch();
        self.store.save(&analysis)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                let err = ArtifactError::Unreadable {
                    path: path.to_string(),
                    reason: e.to_string(),
                };
                self.fail(&mut analysis, err.to_string(), None)?;
                return Err(err.into());
            }
        };
        analysis.original_content = Some(content.clone());

        let prompt = build_improvement_prompt(&content, analysis.user_instructions.as_deref());
        let request = ChatRequest {
            model: analysis.model.clone(),
            messages: build_context(Some(&analysis.system_prompt), &[], &prompt),
            system: Some(analysis.system_prompt.clone()),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        debug!(analysis_id = %analysis.id, prompt_chars = prompt.len(), "Dispatching improvement");

        let (completion, elapsed_ms) =
            match self.registry.dispatch(&analysis.provider, &request).await {
                Ok(ProviderOutcome::Completed {
                    completion,
                    elapsed_ms,
                }) => (completion, elapsed_ms),
                Ok(ProviderOutcome::Failed { error, elapsed_ms }) => {
                    self.fail(&mut analysis, error, Some(elapsed_ms))?;
                    return Ok(analysis);
                }
                Err(e) => {
                    self.fail(&mut analysis, e.to_string(), None)?;
                    return Ok(analysis);
                }
            };

        let improved = strip_code_fences(&completion.text);
        if improved.is_empty() {
            self.fail(&mut analysis, "Provider returned an empty response", Some(elapsed_ms))?;
            return Ok(analysis);
        }
        if let Err(e) = write_file_atomic(&path, &improved) {
            self.fail(
                &mut analysis,
                format!("Failed to overwrite {path}: {e:#}"),
                Some(elapsed_ms),
            )?;
            return Ok(analysis);
        }

        if analysis.model.is_empty() {
            analysis.model.clone_from(&completion.model);
        }
        analysis.result.complete(
            AnalysisRecord::COLLECTION,
            &key,
            completion.text,
            completion.tokens_used,
            elapsed_ms,
        )?;
        analysis.improved_content = Some(improved.clone());
        analysis.touch();
        self.store.save(&analysis)?;
        info!(analysis_id = %analysis.id, path = %path, status = %analysis.status(), "Artifact rewritten");

        if let Some(note) = self.deploy(&analysis, &path, &improved).await {
            analysis.deployment = Some(note);
            analysis.touch();
            self.store.save(&analysis)?;
        }
        Ok(analysis)
    }

    /// Create and run in one step
    pub async fn improve(&self, request: &ImproveRequest) -> Result<AnalysisRecord, EngineError> {
        let analysis = self.create(request)?;
        self.run(analysis).await
    }

    /// Reset a `failed` analysis to `pending` and run it again
    pub async fn retry(&self, id: &str) -> Result<AnalysisRecord, EngineError> {
        let mut analysis = self.show(id)?;
        let key = analysis.key();
        analysis
            .result
            .reset_for_retry(AnalysisRecord::COLLECTION, &key)?;
        analysis.improved_content = None;
        analysis.deployment = None;
        analysis.touch();
        self.store.save(&analysis)?;
        info!(analysis_id = %analysis.id, "Retrying analysis");
        self.run(analysis).await
    }

    pub fn show(&self, id: &str) -> Result<AnalysisRecord, EngineError> {
        Ok(self.store.load(&parse_id("analysis", id)?.to_string())?)
    }

    /// All analyses, newest first
    pub fn list(&self) -> Result<Vec<AnalysisRecord>, EngineError> {
        let mut analyses: Vec<AnalysisRecord> = self.store.list()?;
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(analyses)
    }

    fn fail(
        &self,
        analysis: &mut AnalysisRecord,
        error: impl Into<String>,
        elapsed_ms: Option<u64>,
    ) -> Result<(), EngineError> {
        let key = analysis.key();
        analysis
            .result
            .fail(AnalysisRecord::COLLECTION, &key, error, elapsed_ms)?;
        analysis.touch();
        self.store.save(analysis)?;
        warn!(
            analysis_id = %analysis.id,
            status = %analysis.status(),
            error = ?analysis.result.error_message,
            "Analysis failed"
        );
        Ok(())
    }

    async fn deploy(
        &self,
        analysis: &AnalysisRecord,
        path: &Utf8Path,
        content: &str,
    ) -> Option<DeploymentNote> {
        let deployer = self.deployer.as_ref()?;
        let file_name = path.file_name()?;
        let note = match deployer
            .deploy(content, file_name, analysis.workflow_id.as_deref())
            .await
        {
            Ok(record) => {
                let delivered = record.delivered_path().unwrap_or_default().to_string();
                info!(analysis_id = %analysis.id, deployment_id = %record.id, path = %delivered, "Deployed rewrite");
                DeploymentNote::delivered(record.id, delivered)
            }
            Err(e) => {
                warn!(analysis_id = %analysis.id, error = %e, "Deployment of rewrite failed");
                DeploymentNote::failed(e.record().map(|r| r.id), e.to_string())
            }
        };
        Some(note)
    }
}
