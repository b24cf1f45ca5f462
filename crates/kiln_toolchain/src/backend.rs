//! Native backend command assembly.
//!
//! The backend is a clang-compatible driver. It turns IR into objects,
//! optionally into assembly, and links objects into binaries.

use kiln_common::Env;
use std::path::Path;

/// The LLVM target triple for an environment.
pub fn target_triple(env: &Env) -> String {
    match (env.os(), env.arch()) {
        ("darwin", "arm64") => "arm64-apple-macosx".to_string(),
        ("darwin", "amd64") => "x86_64-apple-macosx".to_string(),
        ("linux", "amd64") => "x86_64-unknown-linux-gnu".to_string(),
        ("linux", "arm64") => "aarch64-unknown-linux-gnu".to_string(),
        ("windows", "amd64") => "x86_64-pc-windows-msvc".to_string(),
        ("windows", "arm64") => "aarch64-pc-windows-msvc".to_string(),
        (os, arch) => format!("{arch}-unknown-{os}"),
    }
}

/// Extra link flags for an environment and the workspace link options.
///
/// Darwin always strips dead code. Unknown options are ignored.
pub fn link_flags(env: &Env, options: &[String]) -> Vec<String> {
    let darwin = env.os() == "darwin";
    let linux = env.os() == "linux";

    let mut flags: Vec<&str> = Vec::new();
    if darwin {
        flags.push("-Wl,-dead_strip");
    }
    for option in options {
        match option.as_str() {
            "PIE" | "pie" => flags.push(if darwin { "-Wl,-pie" } else { "-pie" }),
            "static" if linux => flags.push("-static"),
            "dead_strip" | "dce" if darwin => flags.push("-Wl,-dead_strip"),
            "dead_strip" | "dce" if linux => flags.push("-Wl,--gc-sections"),
            other => tracing::trace!(option = other, env = %env, "link option has no effect"),
        }
    }

    let mut out: Vec<String> = Vec::with_capacity(flags.len());
    for flag in flags {
        if !out.iter().any(|f| f == flag) {
            out.push(flag.to_string());
        }
    }
    out
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A clang-compatible backend driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    driver: String,
}

impl Backend {
    /// Creates a backend running `driver`.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
        }
    }

    /// The driver executable.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Arguments compiling IR into an object file.
    pub fn object_args(&self, ir: &Path, object: &Path, env: &Env) -> Vec<String> {
        vec![
            "-c".into(),
            "-x".into(),
            "ir".into(),
            arg(ir),
            "-o".into(),
            arg(object),
            "-target".into(),
            target_triple(env),
        ]
    }

    /// Arguments compiling IR into assembly.
    pub fn assembly_args(&self, ir: &Path, asm: &Path, env: &Env) -> Vec<String> {
        vec![
            "-S".into(),
            "-x".into(),
            "ir".into(),
            arg(ir),
            "-o".into(),
            arg(asm),
            "-target".into(),
            target_triple(env),
        ]
    }

    /// Arguments linking `objects` into `binary`.
    pub fn link_args(
        &self,
        objects: &[impl AsRef<Path>],
        binary: &Path,
        env: &Env,
        options: &[String],
    ) -> Vec<String> {
        let mut args = vec!["-target".to_string(), target_triple(env)];
        args.extend(objects.iter().map(|o| arg(o.as_ref())));
        args.push("-o".into());
        args.push(arg(binary));
        args.extend(link_flags(env, options));
        args
    }
}
