use crate::runtime::{BuiltinRuntime, ClassSource, JdkRuntime};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Settings shared by every metadata job of one run.
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Directory receiving `<label>_meta.json` files.
    pub output_dir: PathBuf,
    /// Regenerate even when the output file already exists.
    pub force: bool,
    /// The primary archive carries obfuscated names; enum fix-up asks the
    /// name oracle instead of trusting the bytecode.
    pub obfuscated: bool,
    /// Explicit JDK location. `None` falls back to [`detect_java_home`].
    pub java_home: Option<PathBuf>,
    /// Consult the installed JDK for classes the archives do not carry.
    pub use_jdk_runtime: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./out"),
            force: false,
            obfuscated: false,
            java_home: None,
            use_jdk_runtime: true,
        }
    }
}

impl MetadataConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_obfuscated(mut self, obfuscated: bool) -> Self {
        self.obfuscated = obfuscated;
        self
    }

    pub fn with_java_home(mut self, java_home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(java_home.into());
        self
    }

    pub fn with_jdk_runtime(mut self, enabled: bool) -> Self {
        self.use_jdk_runtime = enabled;
        self
    }

    /// Runtime class sources in lookup order: the JDK (when enabled and
    /// found), then the builtin foundational types.
    pub fn runtime_sources(&self) -> Vec<Box<dyn ClassSource>> {
        let mut sources: Vec<Box<dyn ClassSource>> = Vec::new();

        if self.use_jdk_runtime {
            match self.java_home.clone().or_else(detect_java_home) {
                Some(home) => match JdkRuntime::from_java_home(&home) {
                    Ok(runtime) if !runtime.is_empty() => {
                        debug!(java_home = %home.display(), "using JDK runtime classes");
                        sources.push(Box::new(runtime));
                    }
                    Ok(_) => debug!(java_home = %home.display(), "no runtime archives under java home"),
                    Err(error) => warn!(java_home = %home.display(), error = %error, "failed to open JDK runtime"),
                },
                None => debug!("no java home detected"),
            }
        }

        sources.push(Box::new(BuiltinRuntime::new()));
        sources
    }
}

/// `JAVA_HOME` when it exists, else the installation owning `java` on `PATH`.
pub fn detect_java_home() -> Option<PathBuf> {
    if let Ok(path) = env::var("JAVA_HOME") {
        let candidate = PathBuf::from(path);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let java = which::which("java").ok()?;
    // Follow e.g. /usr/bin/java -> /usr/lib/jvm/<jdk>/bin/java.
    let java = java.canonicalize().unwrap_or(java);
    java.parent()?.parent().map(Path::to_path_buf)
}

/// One metadata artifact: a primary archive plus the libraries it links
/// against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataJob {
    pub label: String,
    pub primary: PathBuf,
    pub libraries: Vec<PathBuf>,
}

impl MetadataJob {
    pub fn new(label: impl Into<String>, primary: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            primary: primary.into(),
            libraries: Vec::new(),
        }
    }

    pub fn with_libraries<I, P>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.libraries.extend(libraries.into_iter().map(Into::into));
        self
    }

    pub fn output_path(&self, config: &MetadataConfig) -> PathBuf {
        config.output_dir.join(format!("{}_meta.json", self.label))
    }
}
