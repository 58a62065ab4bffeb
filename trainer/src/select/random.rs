use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::error::EngineError;
use crate::select::{ElementSelector, iteration_budget_left, push_child};

/// Picks a uniformly random child, with replacement, a number of times.
pub struct RandomListSelector {
    picks: i32,
    executed: u32,
    rng: StdRng,
}

impl RandomListSelector {
    /// `picks` selections per visit; negative means unbounded.
    pub fn new(picks: i32) -> Self {
        Self {
            picks,
            executed: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(-1)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl ElementSelector for RandomListSelector {
    fn initialize(&mut self, _owner: ElementId) {
        self.executed = 0;
    }

    fn select_next(
        &mut self,
        owner: ElementId,
        ctx: &mut ExecutionContext,
    ) -> Result<bool, EngineError> {
        if !iteration_budget_left(self.picks, self.executed) {
            return Ok(false);
        }
        let children = ctx.tree().children(owner);
        let Some(child) = children.choose(&mut self.rng).copied() else {
            return Ok(false);
        };
        self.executed += 1;
        push_child(ctx, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TreeFixture;

    #[test]
    fn picks_the_requested_number_of_children() {
        let fixture = TreeFixture::list_of_leaves(&["a", "b", "c"]);
        let (root, leaves) = (fixture.root, fixture.leaves.clone());
        let mut ctx = fixture.into_context();
        let mut selector = RandomListSelector::new(5).with_seed(3);
        selector.initialize(root);
        let mut picks = 0;
        while selector.select_next(root, &mut ctx).expect("select") {
            let child = ctx.tree_mut().pop().expect("child");
            assert!(leaves.contains(&child));
            picks += 1;
        }
        assert_eq!(picks, 5);
    }

    #[test]
    fn no_children_means_no_push() {
        let fixture = TreeFixture::list_of_leaves(&[]);
        let root = fixture.root;
        let mut ctx = fixture.into_context();
        let mut selector = RandomListSelector::unbounded();
        assert!(!selector.select_next(root, &mut ctx).expect("select"));
    }
}
