//! Sourcegen Incremental Pipeline Engine
//!
//! This crate runs source generators incrementally. A generator declares a
//! pipeline of steps over the compilation's syntax trees and auxiliary
//! texts; the engine keeps every step's output from the previous run and
//! only re-executes the parts whose inputs actually changed.
//!
//! # Architecture
//!
//! Every step's output is a [`StateTable`]: an ordered list of values, each
//! tagged as added, modified, removed or cached relative to the last run.
//! A step whose inputs are fully cached republishes its previous table
//! without running user code.
//!
//! ```text
//! syntax trees ─┬─▶ source_filter_transform ─▶ select ─┐
//!               └─▶ alias_aware_selector ──────────────┼─▶ combine ─▶ output
//! additional texts ─▶ select_many ─▶ collect ──────────┘
//! ```
//!
//! Tables of one run are gathered in a [`TableStore`], an immutable snapshot
//! owned by the [`DriverState`]. Runs never mutate a published store: they
//! build a new one and publish it only once every generator has finished.
//!
//! ## Key Features
//!
//! - **Per-entry reuse**: unchanged upstream entries keep their mapped values
//! - **Per-file work**: tree-based steps only re-walk files whose syntax changed
//! - **Alias-aware selection**: markers are found through `using` aliases,
//!   and a global alias change only re-walks the files that looked it up
//! - **Edit application**: auxiliary-input edits re-run only the steps that
//!   read auxiliary texts, with a full run as the fallback
//! - **Cancellation**: a cancelled run publishes nothing
//!
//! # Example
//!
//! ```rust,ignore
//! use sourcegen_incremental::prelude::*;
//!
//! let generator = Generator::new("serializers", |b| {
//!     let marked = b.alias_aware_selector("Serializable", NodeShape::TypeDeclaration)?;
//!     let sources = b.select(&marked, |m: &MatchedNode| {
//!         let name = m.name().unwrap_or("Anonymous");
//!         GeneratedSource::new(format!("{name}.g.cs"), format!("// {name}"))
//!     });
//!     b.register_output(OutputKind::Source, &sources);
//!     Ok(())
//! })?;
//!
//! let driver = DriverState::new(vec![generator], DriverOptions::default());
//! let driver = driver.run_full(&compilation, &CancellationToken::none())?;
//! ```

#![warn(missing_debug_implementations)]

// Core modules
pub mod cancel;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod node;
pub mod nodes;
pub mod pipeline;
pub mod result;
pub mod selector;
pub mod store;
pub mod table;

mod context;
mod edits;
mod executor;

// Re-export main types
pub use cancel::CancellationToken;
pub use config::{ConfigError, DriverOptions};
pub use driver::{DriverState, DriverStatus};
pub use error::{EditFailure, EngineError};
pub use metrics::{MetricsSnapshot, StepRun};
pub use node::{
    GraphId, Handle, NodeId, NodeKind, PipelineValue, Revision, ValueHandle, ValuesHandle,
};
pub use nodes::{GeneratedSource, OutputKind, SyntaxContext};
pub use pipeline::{Generator, PipelineBuilder};
pub use result::{DriverRunResult, GeneratorRunResult};
pub use selector::{AliasPair, GlobalAliases, MatchedNode, NodeShape};
pub use sourcegen_types::{
    AdditionalText, Compilation, PendingEdit, SyntaxKind, SyntaxNode, SyntaxTree, TreeId,
};
pub use store::{TableKey, TablePart, TableStore};
pub use table::{Entry, EntryState, StateTable, TableBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::config::DriverOptions;
    pub use crate::driver::{DriverState, DriverStatus};
    pub use crate::nodes::{GeneratedSource, OutputKind, SyntaxContext};
    pub use crate::pipeline::{Generator, PipelineBuilder};
    pub use crate::selector::{MatchedNode, NodeShape};
    pub use sourcegen_types::{
        AdditionalText, Attribute, Compilation, PendingEdit, SyntaxKind, SyntaxNode, SyntaxTree,
        TreeId, UsingDirective,
    };
}
