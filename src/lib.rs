//! Bridge between graph match clauses and operator trees.
//!
//! The input direction turns match sentences into a canonical [`Pattern`]
//! plus a [`SideTable`] holding aliases and predicates. The output direction
//! turns planner shapes over canonical patterns into a [`PhysicalPlan`],
//! restoring the user-facing names from the side table.

#![warn(missing_docs)]

pub mod bridge;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod explain;
pub mod expr;
pub mod logical;
pub mod materializer;
pub mod pattern;
pub mod physical;
pub mod shape;
pub mod side_table;
pub mod types;

pub use bridge::{BridgeOutput, PatternBridge};
pub use builder::{CompilationSession, PatternBuilder};
pub use catalog::{HeuristicSelectivity, InMemoryCatalog, SchemaCatalog, SelectivityOracle};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use explain::PlanExplain;
pub use materializer::PlanMaterializer;
pub use pattern::Pattern;
pub use physical::PhysicalPlan;
pub use shape::PatternPlan;
pub use side_table::SideTable;
