// jm_metadata - Class hierarchy resolution and jar metadata generation
mod config;
mod diagnostics;
mod emit;
mod error;
mod loader;
mod model;
mod oracle;
mod pipeline;
mod resolver;
mod runtime;

pub use config::{detect_java_home, MetadataConfig, MetadataJob};
pub use diagnostics::Diagnostic;
pub use emit::{BounceMetadata, ClassMetadata, FieldMetadata, MetadataMap, MethodMetadata, RecordMetadata};
pub use error::{LoadError, MetadataError};
pub use loader::ClassLoader;
pub use model::{
    Bounce, ClassRecord, FieldRecord, MethodRecord, RecordComponent, ResolutionState, RECORD_BASE,
};
pub use oracle::{BytecodeNames, ClassMapping, MappingTable, NameOracle};
pub use pipeline::{generate, make_metadata, resolve_job, run_batch, BatchReport, Generation};
pub use resolver::Resolver;
pub use runtime::{BuiltinRuntime, ClassSource, JdkRuntime, MemorySource};
