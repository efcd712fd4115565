use crate::error::LoadError;
use crate::model::ClassRecord;
use crate::runtime::{BuiltinRuntime, ClassSource, MemorySource};
use jm_classfile::parse_class;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Lazy, memoizing source of [`ClassRecord`]s for one resolution run.
///
/// Archives register raw bytes up front; a record is parsed the first time it
/// is requested and its bytes dropped. Names found nowhere are remembered and
/// never looked up again.
pub struct ClassLoader {
    records: HashMap<String, ClassRecord>,
    missing: BTreeSet<String>,
    pending: MemorySource,
    archived: HashSet<String>,
    local: HashSet<String>,
    runtime: Vec<Box<dyn ClassSource>>,
}

impl ClassLoader {
    /// Loader whose runtime fallback is tried in the given order.
    pub fn new(runtime: Vec<Box<dyn ClassSource>>) -> Self {
        Self {
            records: HashMap::new(),
            missing: BTreeSet::new(),
            pending: MemorySource::new(),
            archived: HashSet::new(),
            local: HashSet::new(),
            runtime,
        }
    }

    /// Loader backed only by the synthesized foundational classes.
    pub fn with_builtin_runtime() -> Self {
        Self::new(vec![Box::new(BuiltinRuntime::new())])
    }

    /// Register every class in a jar/zip archive or exploded directory.
    ///
    /// Returns the names first seen in this archive; names registered by an
    /// earlier archive keep their earlier bytes.
    pub fn load(&mut self, path: &Path, primary: bool) -> Result<BTreeSet<String>, LoadError> {
        let entries = if path.is_dir() {
            read_directory(path)?
        } else {
            read_archive(path)?
        };
        let added = self.load_entries(entries, primary);
        debug!(
            archive = %path.display(),
            primary,
            classes = added.len(),
            "registered archive classes"
        );
        Ok(added)
    }

    /// Register in-memory `(internal name, bytes)` pairs.
    pub fn load_entries<I>(&mut self, entries: I, primary: bool) -> BTreeSet<String>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut added = BTreeSet::new();
        for (name, bytes) in entries {
            if !self.archived.insert(name.clone()) {
                continue;
            }
            if primary {
                self.local.insert(name.clone());
            }
            self.pending.insert(name.clone(), bytes);
            added.insert(name);
        }
        added
    }

    pub fn get(&mut self, name: &str) -> Option<&ClassRecord> {
        if self.ensure_loaded(name) {
            self.records.get(name)
        } else {
            None
        }
    }

    pub fn record_mut(&mut self, name: &str) -> Option<&mut ClassRecord> {
        if self.ensure_loaded(name) {
            self.records.get_mut(name)
        } else {
            None
        }
    }

    /// Already-parsed record, without triggering a load.
    pub fn peek(&self, name: &str) -> Option<&ClassRecord> {
        self.records.get(name)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.local.contains(name)
    }

    /// Names that could not be found or parsed, sorted.
    pub fn missing_classes(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Names of every record parsed so far, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort();
        names
    }

    /// True when `target` is reachable from `candidate` over superclass and
    /// interface edges, `candidate` itself included.
    pub fn is_instance(&mut self, candidate: &str, target: &str) -> bool {
        if candidate == target {
            return true;
        }

        let mut seen = HashSet::from([candidate.to_string()]);
        let mut queue = VecDeque::from([candidate.to_string()]);
        while let Some(name) = queue.pop_front() {
            if name == target {
                return true;
            }
            let Some(record) = self.get(&name) else {
                continue;
            };
            for parent in record.supertypes() {
                if seen.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }
        false
    }

    fn ensure_loaded(&mut self, name: &str) -> bool {
        if self.records.contains_key(name) {
            return true;
        }
        if self.missing.contains(name) {
            return false;
        }

        let bytes = match self.pending.find_class(name) {
            Some(bytes) => Some(bytes),
            None => self
                .runtime
                .iter_mut()
                .find_map(|source| source.find_class(name)),
        };
        let Some(bytes) = bytes else {
            warn!(class = %name, "failed to find class");
            self.missing.insert(name.to_string());
            return false;
        };

        match parse_class(&bytes) {
            Ok(parsed) if parsed.name == name => {
                let record = ClassRecord::from_parsed(parsed, self.local.contains(name));
                debug!(class = %name, local = record.is_local, "parsed class");
                self.records.insert(name.to_string(), record);
                true
            }
            Ok(parsed) => {
                warn!(class = %name, declared = %parsed.name, "class entry declares a different name");
                self.missing.insert(name.to_string());
                false
            }
            Err(error) => {
                warn!(class = %name, error = %error, "failed to parse class");
                self.missing.insert(name.to_string());
                false
            }
        }
    }
}

fn read_archive(path: &Path) -> Result<Vec<(String, Vec<u8>)>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|source| LoadError::Zip {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for idx in 0..archive.len() {
        let mut entry = match archive.by_index(idx) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(archive = %path.display(), entry = idx, error = %error, "skipping unreadable archive entry");
                continue;
            }
        };
        if !entry.is_file() {
            continue;
        }
        let Some(name) = class_name_of_entry(entry.name()) else {
            continue;
        };

        let mut buffer = Vec::with_capacity(entry.size() as usize);
        if let Err(error) = entry.read_to_end(&mut buffer) {
            warn!(archive = %path.display(), entry = %name, error = %error, "unreadable archive entry, class treated as missing");
            buffer.clear();
        }
        // An empty body never parses, so a damaged entry is negatively cached
        // under its own name instead of falling through to a later archive.
        entries.push((name, buffer));
    }
    Ok(entries)
}

fn read_directory(root: &Path) -> Result<Vec<(String, Vec<u8>)>, LoadError> {
    let mut entries = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let listing = fs::read_dir(&dir).map_err(|source| LoadError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|source| LoadError::Io {
                path: dir.clone(),
                source,
            })?;
            paths.push(entry.path());
        }
        paths.sort();

        for path in paths {
            if path.is_dir() {
                dirs.push(path);
                continue;
            }
            if path.extension().and_then(OsStr::to_str) != Some("class") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let entry_name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let Some(name) = class_name_of_entry(&entry_name) else {
                continue;
            };
            let bytes = fs::read(&path).unwrap_or_else(|error| {
                warn!(archive = %root.display(), entry = %name, error = %error, "unreadable class file, class treated as missing");
                Vec::new()
            });
            entries.push((name, bytes));
        }
    }
    Ok(entries)
}

/// Internal class name for an archive entry, or `None` for entries that are
/// not loadable classes.
fn class_name_of_entry(entry: &str) -> Option<String> {
    if entry.starts_with("META-INF/") {
        return None;
    }
    let stem = entry.strip_suffix(".class")?;
    if stem == "module-info" || stem.ends_with("/module-info") {
        return None;
    }
    Some(stem.to_string())
}
