//! Entry point wiring the catalog, selectivity oracle, and configuration.

use std::sync::Arc;

use tracing::debug;

use crate::builder::{CompilationSession, PatternBuilder};
use crate::catalog::{SchemaCatalog, SelectivityOracle};
use crate::config::BridgeConfig;
use crate::explain::PlanExplain;
use crate::logical::MatchSentence;
use crate::materializer::PlanMaterializer;
use crate::physical::PhysicalPlan;
use crate::shape::{naive_extend_chain, PatternPlan};
use crate::types::Result;

/// Plan produced end to end, with its explain tree.
#[derive(Clone, Debug)]
pub struct BridgeOutput {
    /// Session the plan was materialized from.
    pub session: CompilationSession,
    /// Operator tree.
    pub plan: PhysicalPlan,
    /// Explain tree and plan hash.
    pub explain: PlanExplain,
}

/// Converts match sentences into patterns and planner shapes into operator
/// trees for one schema.
///
/// Holds no per-query state; every call works on its own session.
pub struct PatternBridge {
    catalog: Arc<dyn SchemaCatalog>,
    oracle: Arc<dyn SelectivityOracle>,
    config: BridgeConfig,
}

impl PatternBridge {
    /// Creates a bridge with the given collaborators and configuration.
    pub fn new(
        catalog: Arc<dyn SchemaCatalog>,
        oracle: Arc<dyn SelectivityOracle>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            catalog,
            oracle,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Input direction: builds the canonical pattern and side table.
    pub fn build(&self, sentences: &[MatchSentence]) -> Result<CompilationSession> {
        PatternBuilder::new(self.oracle.as_ref())
            .with_search_limit(self.config.canonical.search_limit)
            .build(sentences)
    }

    /// Output direction: materializes a planner shape over `session`.
    pub fn materialize(
        &self,
        session: &CompilationSession,
        plan: &PatternPlan,
    ) -> Result<PhysicalPlan> {
        PlanMaterializer::new(self.catalog.as_ref()).materialize(plan, &session.side_table)
    }

    /// Explain tree of `plan` under the configured redaction setting.
    pub fn explain(&self, plan: &PhysicalPlan) -> PlanExplain {
        PlanExplain::new(plan, self.config.explain.redact_literals)
    }

    /// Builds, plans with the naive extend chain, and materializes.
    pub fn plan_naive(&self, sentences: &[MatchSentence]) -> Result<BridgeOutput> {
        let session = self.build(sentences)?;
        let shape = naive_extend_chain(&session.pattern, self.config.canonical.search_limit)?;
        let plan = self.materialize(&session, &shape)?;
        let explain = self.explain(&plan);
        debug!(
            pattern = %session.pattern.id(),
            shape = shape.name(),
            plan_hash = explain.plan_hash,
            "bridge.plan.naive"
        );
        Ok(BridgeOutput {
            session,
            plan,
            explain,
        })
    }
}
