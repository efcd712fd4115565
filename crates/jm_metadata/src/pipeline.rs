//! Per-artifact orchestration: load, resolve, emit.

use crate::config::{MetadataConfig, MetadataJob};
use crate::diagnostics::Diagnostic;
use crate::emit::MetadataMap;
use crate::error::MetadataError;
use crate::loader::ClassLoader;
use crate::oracle::NameOracle;
use crate::resolver::Resolver;
use std::path::PathBuf;
use tracing::{error, info};

/// Metadata for one job together with everything noticed on the way.
#[derive(Debug, Clone)]
pub struct Generation {
    pub metadata: MetadataMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Load the job's archives, resolve every primary class and snapshot them.
///
/// The primary archive is registered first so its classes shadow library
/// copies of the same name.
pub fn resolve_job(config: &MetadataConfig, job: &MetadataJob, oracle: &dyn NameOracle) -> Result<Generation, MetadataError> {
    let mut loader = ClassLoader::new(config.runtime_sources());
    let classes = loader.load(&job.primary, true)?;
    for library in &job.libraries {
        loader.load(library, false)?;
    }

    let mut resolver = Resolver::new(loader, oracle, config.obfuscated);
    resolver.resolve_archive(&classes);
    let (loader, diagnostics) = resolver.into_parts();

    Ok(Generation {
        metadata: MetadataMap::collect(&loader, &classes),
        diagnostics,
    })
}

pub fn generate(config: &MetadataConfig, job: &MetadataJob, oracle: &dyn NameOracle) -> Result<MetadataMap, MetadataError> {
    resolve_job(config, job, oracle).map(|generation| generation.metadata)
}

/// Write `<output>/<label>_meta.json`.
///
/// Returns `None` without touching anything when the file already exists and
/// `config.force` is off.
pub fn make_metadata(
    config: &MetadataConfig,
    job: &MetadataJob,
    oracle: &dyn NameOracle,
) -> Result<Option<PathBuf>, MetadataError> {
    let target = job.output_path(config);
    if !config.force && target.is_file() {
        info!(target = %target.display(), "metadata up to date, skipping");
        return Ok(None);
    }

    let generation = resolve_job(config, job, oracle)?;
    generation.metadata.write_json(&target)?;
    info!(
        target = %target.display(),
        classes = generation.metadata.len(),
        diagnostics = generation.diagnostics.len(),
        "wrote metadata"
    );
    Ok(Some(target))
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    /// Labels whose output already existed.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, MetadataError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every job; a failing job is logged and recorded, the rest still run.
pub fn run_batch(config: &MetadataConfig, jobs: &[MetadataJob], oracle: &dyn NameOracle) -> BatchReport {
    let mut report = BatchReport::default();
    for job in jobs {
        match make_metadata(config, job, oracle) {
            Ok(Some(path)) => report.written.push(path),
            Ok(None) => report.skipped.push(job.label.clone()),
            Err(err) => {
                error!(label = %job.label, error = %err, "failed to generate metadata");
                report.failed.push((job.label.clone(), err));
            }
        }
    }
    report
}
