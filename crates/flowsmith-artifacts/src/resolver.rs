use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

use flowsmith_config::ArtifactsConfig;
use flowsmith_utils::paths::is_single_segment;

use crate::error::ArtifactError;
use crate::generation::{FileGenerationLookup, GenerationLookup, GenerationStatus};

/// Loose reference to a workflow artifact; at least one key must be set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactQuery {
    pub workflow_id: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<Utf8PathBuf>,
}

impl ArtifactQuery {
    #[must_use]
    pub fn by_id(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: Some(workflow_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_name(file_name: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_path(file_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workflow_id.as_deref().is_none_or(str::is_empty)
            && self.file_name.as_deref().is_none_or(str::is_empty)
            && self.file_path.is_none()
    }
}

/// A concrete artifact file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub path: Utf8PathBuf,
    /// Known when resolution went through a workflow directory or the caller named one
    pub workflow_id: Option<String>,
}

/// Resolves artifact references against `<root>/<workflow_id>/<file>.<ext>`
#[derive(Clone)]
pub struct ArtifactResolver {
    root: Utf8PathBuf,
    extension: String,
    lookup: Arc<dyn GenerationLookup>,
}

impl std::fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("root", &self.root)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl ArtifactResolver {
    #[must_use]
    pub fn new(
        root: impl Into<Utf8PathBuf>,
        extension: impl Into<String>,
        lookup: Arc<dyn GenerationLookup>,
    ) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            lookup,
        }
    }

    /// Resolver reading upstream status from `[artifacts] generations_dir`
    #[must_use]
    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self::new(
            config.root.clone(),
            config.extension.clone(),
            Arc::new(FileGenerationLookup::new(config.generations_dir.clone())),
        )
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub(crate) fn lookup(&self) -> &dyn GenerationLookup {
        self.lookup.as_ref()
    }

    /// Resolve a reference to one file.
    ///
    /// Order: existing `file_path`, then the single source file in the
    /// workflow directory, then a search by `file_name` across all workflow
    /// directories. A missing workflow directory stops resolution with an
    /// explanation derived from the upstream generation status.
    pub fn resolve(&self, query: &ArtifactQuery) -> Result<ResolvedArtifact, ArtifactError> {
        if query.is_empty() {
            return Err(ArtifactError::InvalidArguments);
        }
        if let Some(workflow_id) = query.workflow_id.as_deref()
            && !workflow_id.is_empty()
            && !is_single_segment(workflow_id)
        {
            return Err(ArtifactError::InvalidWorkflowId(workflow_id.to_string()));
        }
        debug!(
            workflow_id = ?query.workflow_id,
            file_name = ?query.file_name,
            file_path = ?query.file_path,
            "Resolving workflow artifact"
        );

        if let Some(path) = &query.file_path {
            if path.is_file() {
                info!(path = %path, "Artifact resolved by path");
                return Ok(ResolvedArtifact {
                    path: path.clone(),
                    workflow_id: query.workflow_id.clone(),
                });
            }
            debug!(path = %path, "Given path does not exist");
        }

        if let Some(workflow_id) = query.workflow_id.as_deref().filter(|id| !id.is_empty()) {
            match self.workflow_dir(workflow_id) {
                Some(dir) if dir.is_dir() => {
                    let files = self.source_files(&dir)?;
                    if let [only] = files.as_slice() {
                        let path = dir.join(only);
                        info!(path = %path, workflow_id, "Artifact resolved by workflow id");
                        return Ok(ResolvedArtifact {
                            path,
                            workflow_id: Some(workflow_id.to_string()),
                        });
                    }
                    warn!(
                        dir = %dir,
                        count = files.len(),
                        "Workflow directory does not hold exactly one source file"
                    );
                }
                _ => return Err(self.unavailable(workflow_id)),
            }
        }

        if let Some(file_name) = query.file_name.as_deref().filter(|n| !n.is_empty()) {
            for dir in self.workflow_dirs()? {
                let candidate = dir.join(file_name);
                if candidate.is_file() {
                    info!(path = %candidate, "Artifact resolved by file name");
                    return Ok(ResolvedArtifact {
                        workflow_id: dir.file_name().map(str::to_string),
                        path: candidate,
                    });
                }
            }
        }

        Err(ArtifactError::not_found(self.available()?))
    }

    /// Every workflow id with its source files (only ids that have some)
    pub fn available(&self) -> Result<BTreeMap<String, Vec<String>>, ArtifactError> {
        let mut available = BTreeMap::new();
        for dir in self.workflow_dirs()? {
            let files = self.source_files(&dir)?;
            if let Some(id) = dir.file_name()
                && !files.is_empty()
            {
                available.insert(id.to_string(), files);
            }
        }
        Ok(available)
    }

    fn unavailable(&self, workflow_id: &str) -> ArtifactError {
        let dir = self.root.join(workflow_id);
        let reason = match self.lookup.status(workflow_id) {
            Ok(Some(record)) => match record.status {
                GenerationStatus::Failed => format!(
                    "failed during generation: {}",
                    record.error_message.unwrap_or_default()
                ),
                GenerationStatus::Processing => {
                    "is still being processed (in elaborazione); try again shortly".to_string()
                }
                GenerationStatus::Pending => "is not yet processed".to_string(),
                GenerationStatus::Completed => {
                    format!("completed but file missing in {dir}")
                }
            },
            Ok(None) => "does not exist upstream".to_string(),
            Err(e) => {
                warn!(workflow_id, error = %e, "Upstream status lookup failed");
                "could not be verified; check that it was generated correctly".to_string()
            }
        };
        warn!(workflow_id, reason = %reason, "Workflow directory missing");
        ArtifactError::WorkflowUnavailable {
            workflow_id: workflow_id.to_string(),
            reason,
        }
    }

    /// `<root>/<id>` for ids that name a single path segment
    pub(crate) fn workflow_dir(&self, workflow_id: &str) -> Option<Utf8PathBuf> {
        is_single_segment(workflow_id).then(|| self.root.join(workflow_id))
    }

    /// Workflow directories under the root, sorted by name
    pub(crate) fn workflow_dirs(&self) -> Result<Vec<Utf8PathBuf>, ArtifactError> {
        let mut dirs: Vec<Utf8PathBuf> = read_dir_paths(&self.root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Source file names in a directory, sorted
    pub(crate) fn source_files(&self, dir: &Utf8Path) -> Result<Vec<String>, ArtifactError> {
        let mut files: Vec<String> = read_dir_paths(dir)?
            .into_iter()
            .filter(|p| p.is_file() && p.extension() == Some(self.extension.as_str()))
            .filter_map(|p| p.file_name().map(str::to_string))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn read_dir_paths(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ArtifactError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ArtifactError::Unreadable {
                path: dir.to_string(),
                reason: e.to_string(),
            });
        }
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ArtifactError::Unreadable {
            path: dir.to_string(),
            reason: e.to_string(),
        })?;
        // Non-UTF-8 names cannot be workflow ids
        if let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) {
            paths.push(path);
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationRecord;
    use flowsmith_utils::{ErrorKind, UserFriendlyError};
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct StaticLookup(HashMap<String, Result<GenerationRecord, ()>>);

    impl GenerationLookup for StaticLookup {
        fn status(&self, id: &str) -> Result<Option<GenerationRecord>, ArtifactError> {
            match self.0.get(id) {
                Some(Ok(record)) => Ok(Some(record.clone())),
                Some(Err(())) => Err(ArtifactError::Lookup {
                    path: id.to_string(),
                    reason: "io".to_string(),
                }),
                None => Ok(None),
            }
        }
    }

    fn record(id: &str, status: GenerationStatus, error: Option<&str>) -> GenerationRecord {
        GenerationRecord {
            id: id.to_string(),
            status,
            generated_file_path: None,
            error_message: error.map(str::to_string),
        }
    }

    fn setup() -> (TempDir, ArtifactResolver) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut records = HashMap::new();
        records.insert(
            "proc".to_string(),
            Ok(record("proc", GenerationStatus::Processing, None)),
        );
        records.insert(
            "bad".to_string(),
            Ok(record("bad", GenerationStatus::Failed, Some("template error"))),
        );
        records.insert(
            "todo".to_string(),
            Ok(record("todo", GenerationStatus::Pending, None)),
        );
        records.insert(
            "done".to_string(),
            Ok(record("done", GenerationStatus::Completed, None)),
        );
        records.insert("broken".to_string(), Err(()));
        let resolver = ArtifactResolver::new(root, "py", Arc::new(StaticLookup(records)));
        (dir, resolver)
    }

    fn write(resolver: &ArtifactResolver, rel: &str, content: &str) -> Utf8PathBuf {
        let path = resolver.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn reason(err: ArtifactError) -> String {
        match err {
            ArtifactError::WorkflowUnavailable { reason, .. } => reason,
            other => panic!("expected WorkflowUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_no_keys_is_invalid_arguments() {
        let (_dir, resolver) = setup();
        let err = resolver.resolve(&ArtifactQuery::default()).unwrap_err();
        assert_eq!(err, ArtifactError::InvalidArguments);
        let err = resolver
            .resolve(&ArtifactQuery::by_id(""))
            .unwrap_err();
        assert_eq!(err, ArtifactError::InvalidArguments);
    }

    #[test]
    fn test_existing_path_wins() {
        let (_dir, resolver) = setup();
        let path = write(&resolver, "elsewhere/x.py", "x");
        let query = ArtifactQuery {
            workflow_id: Some("proc".to_string()),
            file_path: Some(path.clone()),
            ..ArtifactQuery::default()
        };
        assert_eq!(resolver.resolve(&query).unwrap().path, path);
    }

    #[test]
    fn test_single_file_in_workflow_dir() {
        let (_dir, resolver) = setup();
        let path = write(&resolver, "42/model.py", "x=1");
        write(&resolver, "42/README.md", "notes");
        let resolved = resolver.resolve(&ArtifactQuery::by_id("42")).unwrap();
        assert_eq!(resolved.path, path);
        assert_eq!(resolved.workflow_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_upstream_status_messages() {
        let (_dir, resolver) = setup();
        let processing = reason(resolver.resolve(&ArtifactQuery::by_id("proc")).unwrap_err());
        assert!(processing.contains("in elaborazione"));

        let failed = reason(resolver.resolve(&ArtifactQuery::by_id("bad")).unwrap_err());
        assert!(failed.contains("failed during generation: template error"));
        assert!(!failed.contains("in elaborazione"));

        let pending = reason(resolver.resolve(&ArtifactQuery::by_id("todo")).unwrap_err());
        assert!(pending.contains("not yet processed"));

        let done = reason(resolver.resolve(&ArtifactQuery::by_id("done")).unwrap_err());
        assert!(done.contains("completed but file missing in"));

        let ghost = reason(resolver.resolve(&ArtifactQuery::by_id("ghost")).unwrap_err());
        assert!(ghost.contains("does not exist upstream"));

        let broken = reason(resolver.resolve(&ArtifactQuery::by_id("broken")).unwrap_err());
        assert!(broken.contains("could not be verified"));
    }

    #[test]
    fn test_ambiguous_dir_falls_through_to_file_name() {
        let (_dir, resolver) = setup();
        write(&resolver, "multi/a.py", "a");
        write(&resolver, "multi/b.py", "b");
        let target = write(&resolver, "other/b.py", "b2");

        let query = ArtifactQuery {
            workflow_id: Some("multi".to_string()),
            file_name: Some("b.py".to_string()),
            ..ArtifactQuery::default()
        };
        // Sorted listing: "multi" < "other"
        let resolved = resolver.resolve(&query).unwrap();
        assert_eq!(resolved.path, resolver.root().join("multi/b.py"));
        assert_ne!(resolved.path, target);
    }

    #[test]
    fn test_ambiguous_dir_without_name_is_not_found() {
        let (_dir, resolver) = setup();
        write(&resolver, "multi/a.py", "a");
        write(&resolver, "multi/b.py", "b");
        match resolver.resolve(&ArtifactQuery::by_id("multi")).unwrap_err() {
            ArtifactError::NotFound { available, .. } => {
                assert_eq!(available["multi"], vec!["a.py", "b.py"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_search_by_name_and_enumeration() {
        let (_dir, resolver) = setup();
        write(&resolver, "w1/flow.py", "1");
        write(&resolver, "w2/other.py", "2");
        fs::create_dir_all(resolver.root().join("empty")).unwrap();

        let resolved = resolver.resolve(&ArtifactQuery::by_name("other.py")).unwrap();
        assert_eq!(resolved.workflow_id.as_deref(), Some("w2"));

        match resolver.resolve(&ArtifactQuery::by_name("nope.py")).unwrap_err() {
            ArtifactError::NotFound { available, message } => {
                assert_eq!(available.len(), 2);
                assert!(!available.contains_key("empty"));
                assert!(message.contains("w1 (flow.py)"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_path_like_id_is_rejected() {
        let (_dir, resolver) = setup();
        let err = resolver.resolve(&ArtifactQuery::by_id("../etc")).unwrap_err();
        assert_eq!(err, ArtifactError::InvalidWorkflowId("../etc".to_string()));
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn test_path_like_id_rejected_alongside_existing_path() {
        let (_dir, resolver) = setup();
        let path = write(&resolver, "7/flow.py", "a=1");
        let query = ArtifactQuery {
            workflow_id: Some("../../escaped".to_string()),
            file_name: None,
            file_path: Some(path),
        };
        assert!(matches!(
            resolver.resolve(&query),
            Err(ArtifactError::InvalidWorkflowId(_))
        ));
    }

    #[test]
    fn test_custom_extension() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let resolver = ArtifactResolver::new(
            root,
            "ipynb",
            Arc::new(StaticLookup(HashMap::new())),
        );
        write(&resolver, "n/flow.py", "ignored");
        let nb = write(&resolver, "n/flow.ipynb", "{}");
        assert_eq!(resolver.resolve(&ArtifactQuery::by_id("n")).unwrap().path, nb);
    }
}
