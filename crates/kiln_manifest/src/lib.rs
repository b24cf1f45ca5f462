//! The build manifest.
//!
//! `kiln.manifest` is the durable record of a build: the artifacts found in
//! the build tree, the binaries and object indices per target, and the
//! dependency integrity evidence the build was verified with. Its
//! dependency fingerprint also guards the next build against a lock file
//! that changed underneath it.

#![warn(missing_docs)]

pub mod collect;
pub mod error;
pub mod guard;
pub mod model;
pub mod writer;

pub use collect::collect_artifacts;
pub use error::ManifestError;
pub use guard::check_fingerprint;
pub use model::{
    manifest_path, Artifact, ArtifactKind, DebugRefs, Integrity, Manifest, Project,
    MANIFEST_FILE, MANIFEST_SCHEMA,
};
pub use writer::{build_manifest, write_manifest, ManifestInput};
