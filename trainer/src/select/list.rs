use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::error::EngineError;
use crate::select::{ElementSelector, iteration_budget_left, push_child};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Children in declaration order.
    #[default]
    Declared,
    /// A fresh permutation of the children for every iteration.
    Shuffled,
}

/// Extra condition on top of the iteration budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum IterationGate {
    #[default]
    Always,
    /// Iterate only in the listed (1-based) session numbers.
    Sessions {
        allowed: BTreeSet<u32>,
        include_unfinished: bool,
    },
    /// Stop handing out children once `limit` elapsed since the owner was
    /// initialized.
    Deadline { limit: Duration },
}

/// Walks the children of a list element for a number of iterations.
pub struct ListSelector {
    iterations: i32,
    order: ListOrder,
    gate: IterationGate,
    executed: u32,
    pending: VecDeque<ElementId>,
    started: Option<Instant>,
    rng: StdRng,
}

impl ListSelector {
    /// Declared order, `iterations` passes (negative for unbounded).
    pub fn iterated(iterations: i32) -> Self {
        Self {
            iterations,
            order: ListOrder::Declared,
            gate: IterationGate::Always,
            executed: 0,
            pending: VecDeque::new(),
            started: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Shuffled order, `iterations` passes.
    pub fn random_order(iterations: i32) -> Self {
        Self::iterated(iterations).with_order(ListOrder::Shuffled)
    }

    /// Iterate only in the given session numbers.
    pub fn session_gated(
        iterations: i32,
        allowed: impl IntoIterator<Item = u32>,
        include_unfinished: bool,
    ) -> Self {
        Self::iterated(iterations).with_gate(IterationGate::Sessions {
            allowed: allowed.into_iter().collect(),
            include_unfinished,
        })
    }

    /// Iterate until `limit` has elapsed.
    pub fn temporal(iterations: i32, limit: Duration) -> Self {
        Self::iterated(iterations).with_gate(IterationGate::Deadline { limit })
    }

    pub fn with_order(mut self, order: ListOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_gate(mut self, gate: IterationGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn executed_iterations(&self) -> u32 {
        self.executed
    }

    fn can_start_iteration(&self, ctx: &ExecutionContext) -> bool {
        if !iteration_budget_left(self.iterations, self.executed) {
            return false;
        }
        match &self.gate {
            IterationGate::Sessions {
                allowed,
                include_unfinished,
            } => {
                let count = ctx
                    .services()
                    .sessions
                    .session_count(ctx.module_id(), *include_unfinished);
                allowed.contains(&(count + 1))
            }
            IterationGate::Always | IterationGate::Deadline { .. } => true,
        }
    }

    fn can_hand_out(&self) -> bool {
        match &self.gate {
            IterationGate::Deadline { limit } => self
                .started
                .is_none_or(|started| started.elapsed() < *limit),
            _ => true,
        }
    }
}

impl ElementSelector for ListSelector {
    fn initialize(&mut self, _owner: ElementId) {
        self.executed = 0;
        self.pending.clear();
        self.started = Some(Instant::now());
    }

    fn select_next(
        &mut self,
        owner: ElementId,
        ctx: &mut ExecutionContext,
    ) -> Result<bool, EngineError> {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        if self.pending.is_empty() && self.can_start_iteration(ctx) {
            let mut children = ctx.tree().children(owner);
            if self.order == ListOrder::Shuffled {
                children.shuffle(&mut self.rng);
            }
            self.pending = children.into();
            self.executed += 1;
            debug!(owner = %ctx.tree().full_id(owner), iteration = self.executed, "starting list iteration");
        }
        if !self.can_hand_out() {
            return Ok(false);
        }
        match self.pending.pop_front() {
            Some(child) => push_child(ctx, child),
            None => Ok(false),
        }
    }
}
