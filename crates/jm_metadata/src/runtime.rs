//! Fallback class sources consulted when a name is not in any loaded archive.

use crate::error::LoadError;
use jm_classfile::access::*;
use jm_classfile::descriptor::{FieldType, MethodDescriptor};
use jm_classfile::opcodes::*;
use jm_classfile::{ClassFileWriter, CodeWriter, LoadKind, MethodRef};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Provider of raw class bytes by internal name.
pub trait ClassSource {
    fn find_class(&mut self, name: &str) -> Option<Vec<u8>>;
}

/// Name → bytes map. Bytes are handed out once.
#[derive(Debug, Default)]
pub struct MemorySource {
    classes: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(name.into(), bytes);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for MemorySource {
    fn find_class(&mut self, name: &str) -> Option<Vec<u8>> {
        self.classes.remove(name)
    }
}

/// Classes of an installed JDK, read from `jmods/java.base.jmod` or a legacy
/// `rt.jar`.
pub struct JdkRuntime {
    archives: Vec<(PathBuf, ZipArchive<BufReader<File>>)>,
}

impl JdkRuntime {
    /// Runtime archives present under `java_home`, most specific first.
    pub fn runtime_archives(java_home: &Path) -> Vec<PathBuf> {
        [
            java_home.join("jmods").join("java.base.jmod"),
            java_home.join("lib").join("rt.jar"),
            java_home.join("jre").join("lib").join("rt.jar"),
        ]
        .into_iter()
        .filter(|path| path.is_file())
        .collect()
    }

    pub fn open(paths: &[PathBuf]) -> Result<Self, LoadError> {
        let mut archives = Vec::with_capacity(paths.len());
        for path in paths {
            let file = File::open(path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| LoadError::Zip {
                path: path.clone(),
                source,
            })?;
            archives.push((path.clone(), archive));
        }
        Ok(Self { archives })
    }

    pub fn from_java_home(java_home: &Path) -> Result<Self, LoadError> {
        Self::open(&Self::runtime_archives(java_home))
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}

impl ClassSource for JdkRuntime {
    fn find_class(&mut self, name: &str) -> Option<Vec<u8>> {
        // jmod files keep their classes under `classes/`.
        let candidates = [format!("classes/{}.class", name), format!("{}.class", name)];
        for (path, archive) in &mut self.archives {
            for candidate in &candidates {
                let Ok(mut entry) = archive.by_name(candidate) else {
                    continue;
                };
                let mut buffer = Vec::with_capacity(entry.size() as usize);
                match entry.read_to_end(&mut buffer) {
                    Ok(_) => return Some(buffer),
                    Err(error) => {
                        debug!(archive = %path.display(), entry = %candidate, error = %error, "runtime entry unreadable");
                    }
                }
            }
        }
        None
    }
}

const OBJECT: &str = "java/lang/Object";
const ENUM: &str = "java/lang/Enum";
const STRING_DESC: &str = "Ljava/lang/String;";

/// Synthesized shapes of the foundational JDK types, so hierarchies rooted in
/// them resolve without an installed JDK.
#[derive(Debug, Default)]
pub struct BuiltinRuntime;

impl BuiltinRuntime {
    pub const CLASSES: &'static [&'static str] = &[
        "java/io/Serializable",
        "java/lang/Cloneable",
        "java/lang/Comparable",
        ENUM,
        OBJECT,
        "java/lang/Record",
    ];

    pub fn new() -> Self {
        Self
    }

    fn synthesize(name: &str) -> Option<Vec<u8>> {
        let bytes = match name {
            OBJECT => ClassFileWriter::new(OBJECT, None, ACC_PUBLIC | ACC_SUPER)
                .method(ACC_PUBLIC, "<init>", "()V", |code| default_body(code, "()V"))
                .native_method(ACC_PUBLIC | ACC_FINAL, "getClass", "()Ljava/lang/Class;")
                .native_method(ACC_PUBLIC, "hashCode", "()I")
                .method(ACC_PUBLIC, "equals", "(Ljava/lang/Object;)Z", |code| {
                    default_body(code, "(Ljava/lang/Object;)Z")
                })
                .native_method(ACC_PROTECTED, "clone", "()Ljava/lang/Object;")
                .method(ACC_PUBLIC, "toString", "()Ljava/lang/String;", |code| {
                    default_body(code, "()Ljava/lang/String;")
                })
                .native_method(ACC_PUBLIC | ACC_FINAL, "notify", "()V")
                .native_method(ACC_PUBLIC | ACC_FINAL, "notifyAll", "()V")
                .method(ACC_PUBLIC | ACC_FINAL, "wait", "()V", |code| default_body(code, "()V"))
                .method(ACC_PUBLIC | ACC_FINAL, "wait", "(J)V", |code| default_body(code, "(J)V"))
                .method(ACC_PUBLIC | ACC_FINAL, "wait", "(JI)V", |code| default_body(code, "(JI)V"))
                .method(ACC_PROTECTED, "finalize", "()V", |code| default_body(code, "()V"))
                .finish(),
            "java/io/Serializable" | "java/lang/Cloneable" => {
                ClassFileWriter::new(name, Some(OBJECT), ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT).finish()
            }
            "java/lang/Comparable" => ClassFileWriter::new(
                name,
                Some(OBJECT),
                ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
            )
            .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
            .abstract_method(ACC_PUBLIC, "compareTo", "(Ljava/lang/Object;)I")
            .finish(),
            ENUM => {
                let compare = MethodRef::new(ENUM, "compareTo", "(Ljava/lang/Enum;)I");
                ClassFileWriter::new(ENUM, Some(OBJECT), ACC_PUBLIC | ACC_ABSTRACT | ACC_SUPER)
                    .interface("java/lang/Comparable")
                    .interface("java/io/Serializable")
                    .signature("<E:Ljava/lang/Enum<TE;>;>Ljava/lang/Object;Ljava/lang/Comparable<TE;>;Ljava/io/Serializable;")
                    .field(ACC_PRIVATE | ACC_FINAL, "name", STRING_DESC)
                    .field(ACC_PRIVATE | ACC_FINAL, "ordinal", "I")
                    .method(ACC_PROTECTED, "<init>", "(Ljava/lang/String;I)V", |code| {
                        default_body(code, "(Ljava/lang/String;I)V")
                    })
                    .method(ACC_PUBLIC | ACC_FINAL, "name", "()Ljava/lang/String;", |code| {
                        code.load(LoadKind::Reference, 0)
                            .getfield(ENUM, "name", STRING_DESC)
                            .op(ARETURN);
                    })
                    .method(ACC_PUBLIC | ACC_FINAL, "ordinal", "()I", |code| {
                        code.load(LoadKind::Reference, 0)
                            .getfield(ENUM, "ordinal", "I")
                            .op(IRETURN);
                    })
                    .method(ACC_PUBLIC, "toString", "()Ljava/lang/String;", |code| {
                        default_body(code, "()Ljava/lang/String;")
                    })
                    .method(ACC_PUBLIC | ACC_FINAL, "equals", "(Ljava/lang/Object;)Z", |code| {
                        default_body(code, "(Ljava/lang/Object;)Z")
                    })
                    .method(ACC_PUBLIC | ACC_FINAL, "hashCode", "()I", |code| default_body(code, "()I"))
                    .method(ACC_PROTECTED | ACC_FINAL, "clone", "()Ljava/lang/Object;", |code| {
                        default_body(code, "()Ljava/lang/Object;")
                    })
                    .method(ACC_PUBLIC | ACC_FINAL, &compare.name, &compare.descriptor, |code| {
                        default_body(code, "(Ljava/lang/Enum;)I")
                    })
                    .method(
                        ACC_PUBLIC | ACC_FINAL,
                        "getDeclaringClass",
                        "()Ljava/lang/Class;",
                        |code| default_body(code, "()Ljava/lang/Class;"),
                    )
                    .method(
                        ACC_PUBLIC | ACC_STATIC,
                        "valueOf",
                        "(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;",
                        |code| default_body(code, "(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;"),
                    )
                    .method(ACC_PROTECTED | ACC_FINAL, "finalize", "()V", |code| default_body(code, "()V"))
                    .method(
                        ACC_PUBLIC | ACC_SYNTHETIC | ACC_BRIDGE,
                        "compareTo",
                        "(Ljava/lang/Object;)I",
                        |code| {
                            code.load(LoadKind::Reference, 0)
                                .load(LoadKind::Reference, 1)
                                .checkcast(ENUM)
                                .invoke(INVOKEVIRTUAL, &compare)
                                .op(IRETURN);
                        },
                    )
                    .finish()
            }
            "java/lang/Record" => ClassFileWriter::new(name, Some(OBJECT), ACC_PUBLIC | ACC_ABSTRACT | ACC_SUPER)
                .method(ACC_PROTECTED, "<init>", "()V", |code| default_body(code, "()V"))
                .abstract_method(ACC_PUBLIC, "equals", "(Ljava/lang/Object;)Z")
                .abstract_method(ACC_PUBLIC, "hashCode", "()I")
                .abstract_method(ACC_PUBLIC, "toString", "()Ljava/lang/String;")
                .finish(),
            _ => return None,
        };
        Some(bytes)
    }
}

impl ClassSource for BuiltinRuntime {
    fn find_class(&mut self, name: &str) -> Option<Vec<u8>> {
        Self::synthesize(name)
    }
}

/// Return the zero value of the method's return type.
fn default_body(code: &mut CodeWriter<'_>, descriptor: &str) {
    let return_type = MethodDescriptor::parse(descriptor)
        .ok()
        .and_then(|parsed| parsed.return_type);
    match return_type {
        None => {
            code.op(RETURN);
        }
        Some(FieldType::Long) => {
            code.op(LCONST_0).op(LRETURN);
        }
        Some(FieldType::Float) => {
            code.op(FCONST_0).op(FRETURN);
        }
        Some(FieldType::Double) => {
            code.op(DCONST_0).op(DRETURN);
        }
        Some(ty) if ty.is_reference() => {
            code.op(ACONST_NULL).op(ARETURN);
        }
        Some(_) => {
            code.op(ICONST_0).op(IRETURN);
        }
    }
}
