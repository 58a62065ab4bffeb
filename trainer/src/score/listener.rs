use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::exec::TimedDisplay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    /// Full id of the points handler whose level moved.
    pub handler_id: String,
    pub old_level: i64,
    pub new_level: i64,
    pub delta: i64,
}

/// Notified when a points handler below or at this element changes level.
pub trait LevelListener: Send {
    fn level_changed(&mut self, change: &LevelChange, ctx: &mut ExecutionContext);
}

/// Announces level changes with a timed message before the next task.
#[derive(Debug, Clone)]
pub struct LevelFeedbackListener {
    display: Duration,
    up: String,
    down: String,
}

impl LevelFeedbackListener {
    pub fn new(display: Duration) -> Self {
        Self {
            display,
            up: "Level up! Now at level {level}.".to_string(),
            down: "Level down. Now at level {level}.".to_string(),
        }
    }

    /// Messages with an optional `{level}` placeholder.
    pub fn with_messages(mut self, up: impl Into<String>, down: impl Into<String>) -> Self {
        self.up = up.into();
        self.down = down.into();
        self
    }

    pub fn message(&self, change: &LevelChange) -> String {
        let template = if change.delta > 0 { &self.up } else { &self.down };
        template.replace("{level}", &change.new_level.to_string())
    }
}

impl LevelListener for LevelFeedbackListener {
    fn level_changed(&mut self, change: &LevelChange, ctx: &mut ExecutionContext) {
        if self.display.is_zero() {
            return;
        }
        let text = self.message(change);
        debug!(%text, "queueing level feedback");
        ctx.enqueue_temporary_leaf(Arc::new(TimedDisplay::executable(
            "level-feedback",
            text,
            self.display,
        )));
        ctx.set_current_pause(Duration::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementTree;
    use crate::pause::PauseHandler;
    use crate::handler::{Capability, Handler};
    use crate::test_support;

    fn change(delta: i64) -> LevelChange {
        LevelChange {
            handler_id: "module.points".into(),
            old_level: 3,
            new_level: 3 + delta,
            delta,
        }
    }

    #[test]
    fn messages_name_the_new_level() {
        let listener = LevelFeedbackListener::new(Duration::from_secs(3));
        assert_eq!(listener.message(&change(1)), "Level up! Now at level 4.");
        assert_eq!(listener.message(&change(-1)), "Level down. Now at level 2.");
    }

    #[test]
    fn feedback_queues_a_temporary_and_skips_the_pause() {
        let mut tree = ElementTree::new();
        let root = tree.add_list("module");
        tree.set_root(root).expect("root");
        let pause = tree
            .attach(root, PauseHandler::new(Duration::from_millis(500)))
            .expect("pause");
        tree.push(root).expect("push");
        let mut ctx = test_support::context(tree);
        ctx.tree_mut()
            .handler_mut(pause)
            .and_then(Handler::as_pause_mut)
            .expect("pause handler")
            .set_current(Duration::from_millis(500));

        let mut listener = LevelFeedbackListener::new(Duration::from_millis(10));
        listener.level_changed(&change(1), &mut ctx);

        assert_eq!(ctx.pending_temporaries(), 1);
        let current = ctx
            .tree()
            .find_in_stack(Capability::PauseHandler)
            .and_then(|r| ctx.tree().handler(r))
            .and_then(Handler::as_pause)
            .map(PauseHandler::current);
        assert_eq!(current, Some(Duration::ZERO));
    }
}
