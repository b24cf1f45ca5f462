//! Compilation planning and execution for kiln workspaces.
//!
//! [`plan()`] turns a validated workspace into a [`BuildPlan`] ordered by
//! package, unit and target. An [`Executor`] then drives the front-end and
//! the backend for every job on a bounded worker pool, enforces capability
//! and trust rules, persists IR and objects, and rewrites the object
//! indices used for incremental reuse.

#![warn(missing_docs)]

pub mod capability;
pub mod error;
pub mod execute;
pub mod frontend;
pub mod objindex;
pub mod plan;
pub mod unit;

pub use capability::{check_capabilities, required_capability};
pub use error::BuildError;
pub use execute::{Execution, Executor, JobReport};
pub use frontend::{
    confine_code, CompileOutput, CompileRequest, ExternalFrontEnd, FrontEnd, OperationUse, Trust,
    UnitIr,
};
pub use objindex::{ObjectIndex, UnitEntry, INDEX_SCHEMA};
pub use plan::{
    plan, BuildPlan, CompileJob, DebugKind, PackagePlan, PlanOptions, PlanSnapshot, PLAN_SCHEMA,
};
pub use unit::{discover_units, SourceUnit, SOURCE_EXTENSION};
