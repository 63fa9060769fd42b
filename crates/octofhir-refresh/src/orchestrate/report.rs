//! End-of-run report

use chrono::{DateTime, Utc};
use octofhir_refresh_diagnostics::RefreshError;
use octofhir_refresh_model::ResourceType;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Disposition {
    Bundled,
    /// Refreshed on disk, but a bundling precondition failed
    RefreshedNotBundled,
    Failed,
}

impl Disposition {
    pub const ALL: [Disposition; 3] = [Self::Bundled, Self::RefreshedNotBundled, Self::Failed];

    pub fn label(self) -> &'static str {
        match self {
            Self::Bundled => "BUNDLED",
            Self::RefreshedNotBundled => "REFRESHED-NOT-BUNDLED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactReport {
    pub name: String,
    pub kind: ResourceType,
    pub disposition: Disposition,
    /// Why the artifact was not bundled
    pub message: Option<String>,
    /// Lookup errors recorded against the artifact
    pub warnings: Vec<String>,
    pub bundle: Option<PathBuf>,
    pub publish_error: Option<String>,
}

impl ArtifactReport {
    pub fn bundled(name: impl Into<String>, kind: ResourceType, bundle: PathBuf) -> Self {
        Self::new(name, kind, Disposition::Bundled, None).with_bundle(bundle)
    }

    pub fn not_bundled(name: impl Into<String>, kind: ResourceType, reason: impl fmt::Display) -> Self {
        Self::new(name, kind, Disposition::RefreshedNotBundled, Some(reason.to_string()))
    }

    pub fn failed(name: impl Into<String>, kind: ResourceType, reason: impl fmt::Display) -> Self {
        Self::new(name, kind, Disposition::Failed, Some(reason.to_string()))
    }

    fn new(
        name: impl Into<String>,
        kind: ResourceType,
        disposition: Disposition,
        message: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            disposition,
            message,
            warnings: Vec::new(),
            bundle: None,
            publish_error: None,
        }
    }

    fn with_bundle(mut self, bundle: PathBuf) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn with_warnings<'a>(mut self, warnings: impl IntoIterator<Item = &'a RefreshError>) -> Self {
        self.warnings.extend(warnings.into_iter().map(ToString::to_string));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    artifacts: Vec<ArtifactReport>,
}

impl RefreshReport {
    pub fn new(started: DateTime<Utc>) -> Self {
        Self {
            started,
            finished: None,
            artifacts: Vec::new(),
        }
    }

    pub fn record(&mut self, artifact: ArtifactReport) {
        log::debug!("{} {}: {}", artifact.kind, artifact.name, artifact.disposition);
        self.artifacts.push(artifact);
    }

    /// Attach a publish failure; the disposition is left as it is
    pub fn publish_failed(&mut self, kind: &ResourceType, name: &str, error: &RefreshError) {
        if let Some(artifact) = self
            .artifacts
            .iter_mut()
            .find(|a| &a.kind == kind && a.name == name)
        {
            artifact.publish_error = Some(error.to_string());
        }
    }

    /// Sort artifacts and stamp the finish time
    pub fn finish(&mut self) {
        self.artifacts.sort_by(|a, b| {
            (a.disposition, a.kind.as_str(), &a.name).cmp(&(b.disposition, b.kind.as_str(), &b.name))
        });
        self.finished = Some(Utc::now());
    }

    pub fn artifacts(&self) -> &[ArtifactReport] {
        &self.artifacts
    }

    pub fn in_bucket(&self, disposition: Disposition) -> impl Iterator<Item = &ArtifactReport> {
        self.artifacts
            .iter()
            .filter(move |a| a.disposition == disposition)
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.in_bucket(disposition).count()
    }

    pub fn get(&self, kind: &ResourceType, name: &str) -> Option<&ArtifactReport> {
        self.artifacts
            .iter()
            .find(|a| &a.kind == kind && a.name == name)
    }

    pub fn disposition_of(&self, kind: &ResourceType, name: &str) -> Option<Disposition> {
        self.get(kind, name).map(|a| a.disposition)
    }

    pub fn has_failures(&self) -> bool {
        self.count(Disposition::Failed) > 0
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished.map(|f| f - self.started)
    }
}

impl fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for disposition in Disposition::ALL {
            writeln!(f, "{} ({})", disposition, self.count(disposition))?;
            for artifact in self.in_bucket(disposition) {
                write!(f, "  {} {}", artifact.kind, artifact.name)?;
                if let Some(message) = &artifact.message {
                    write!(f, ": {}", message)?;
                }
                writeln!(f)?;
                for warning in &artifact.warnings {
                    writeln!(f, "    warning: {}", warning)?;
                }
                if let Some(error) = &artifact.publish_error {
                    writeln!(f, "    publish failed: {}", error)?;
                }
            }
        }
        Ok(())
    }
}
