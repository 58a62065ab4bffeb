//! Handlers attached to elements and the capabilities they advertise.
//!
//! A handler is looked up by capability rather than by type: the scheduler
//! asks for selectors, the phase dispatcher for phase listeners, the points
//! controller for adaptors and level listeners. Built-in handlers are enum
//! variants; custom ones plug in through the boxed trait variants.

use std::fmt;

use crate::context::ExecutionContext;
use crate::element::ElementId;
use crate::handlers::{
    ConfidenceRatingHandler, EscapeKeyHandler, KeyBinding, OutcomeFeedbackHandler,
    TrialCountEvaluator, TrialCountHandler,
};
use crate::pause::PauseHandler;
use crate::phase::PhaseListener;
use crate::score::{LevelFeedbackListener, LevelListener, PointAdaptor, PointsAndLevelHandler};
use crate::select::{
    CompoundSelector, ElementSelector, ListSelector, RandomListSelector, TimerListSelector,
};
use crate::timeout::TimeoutHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Selector,
    PhaseListener,
    ExecutionStart,
    PointAdaptor,
    LevelListener,
    PauseHandler,
    TimeoutHandler,
    TrialCountEvaluator,
    KeyHandler,
}

/// Position of a handler inside the element arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef {
    pub element: ElementId,
    pub index: usize,
}

/// Identity of a handler while it is being invoked.
#[derive(Debug, Clone)]
pub struct HandlerScope {
    /// Element the handler is attached to.
    pub element: ElementId,
    pub handler: HandlerRef,
    /// Full id of the handler, used as the scope of the values it records.
    pub id: String,
}

pub enum Handler {
    List(ListSelector),
    RandomList(RandomListSelector),
    TimerList(TimerListSelector),
    Compound(CompoundSelector),
    Selector(Box<dyn ElementSelector>),
    PointsAndLevel(PointsAndLevelHandler),
    PointAdaptor(PointAdaptor),
    LevelListener(Box<dyn LevelListener>),
    Pause(PauseHandler),
    Timeout(TimeoutHandler),
    TrialCount(TrialCountHandler),
    TrialCountEvaluator(TrialCountEvaluator),
    OutcomeFeedback(OutcomeFeedbackHandler),
    ConfidenceRating(ConfidenceRatingHandler),
    EscapeKey(EscapeKeyHandler),
    Listener(Box<dyn PhaseListener>),
}

impl Handler {
    pub fn supports(&self, capability: Capability) -> bool {
        use Capability as C;
        match self {
            Handler::List(_) | Handler::RandomList(_) | Handler::Selector(_) => {
                capability == C::Selector
            }
            Handler::TimerList(_) => matches!(capability, C::Selector | C::ExecutionStart),
            Handler::Compound(_) => matches!(capability, C::Selector | C::PhaseListener),
            Handler::PointAdaptor(_) => capability == C::PointAdaptor,
            Handler::LevelListener(_) => capability == C::LevelListener,
            Handler::Pause(_) => matches!(capability, C::PauseHandler | C::PhaseListener),
            Handler::Timeout(_) => matches!(capability, C::TimeoutHandler | C::PhaseListener),
            Handler::TrialCountEvaluator(_) => capability == C::TrialCountEvaluator,
            Handler::EscapeKey(_) => capability == C::KeyHandler,
            Handler::PointsAndLevel(_)
            | Handler::TrialCount(_)
            | Handler::OutcomeFeedback(_)
            | Handler::ConfidenceRating(_)
            | Handler::Listener(_) => capability == C::PhaseListener,
        }
    }

    /// Prefix for generated local ids.
    pub fn default_prefix(&self) -> &'static str {
        match self {
            Handler::List(_) => "list-selector",
            Handler::RandomList(_) => "random-selector",
            Handler::TimerList(_) => "timer-selector",
            Handler::Compound(_) => "compound-selector",
            Handler::Selector(_) => "selector",
            Handler::PointsAndLevel(_) => "points",
            Handler::PointAdaptor(_) => "point-adaptor",
            Handler::LevelListener(_) => "level-listener",
            Handler::Pause(_) => "pause",
            Handler::Timeout(_) => "timeout",
            Handler::TrialCount(_) => "trial-count",
            Handler::TrialCountEvaluator(_) => "trial-count-evaluator",
            Handler::OutcomeFeedback(_) => "feedback",
            Handler::ConfidenceRating(_) => "confidence",
            Handler::EscapeKey(_) => "escape",
            Handler::Listener(_) => "listener",
        }
    }

    pub(crate) fn requires_compound(&self) -> bool {
        matches!(self, Handler::Compound(_))
    }

    pub(crate) fn initialize(&mut self, owner: ElementId) {
        if let Some(selector) = self.as_selector_mut() {
            selector.initialize(owner);
        }
    }

    pub fn as_selector_mut(&mut self) -> Option<&mut dyn ElementSelector> {
        match self {
            Handler::List(s) => Some(s),
            Handler::RandomList(s) => Some(s),
            Handler::TimerList(s) => Some(s),
            Handler::Compound(s) => Some(s),
            Handler::Selector(s) => Some(s.as_mut()),
            _ => None,
        }
    }

    pub fn as_phase_listener_mut(&mut self) -> Option<&mut dyn PhaseListener> {
        match self {
            Handler::Compound(h) => Some(h),
            Handler::PointsAndLevel(h) => Some(h),
            Handler::Pause(h) => Some(h),
            Handler::Timeout(h) => Some(h),
            Handler::TrialCount(h) => Some(h),
            Handler::OutcomeFeedback(h) => Some(h),
            Handler::ConfidenceRating(h) => Some(h),
            Handler::Listener(h) => Some(h.as_mut()),
            _ => None,
        }
    }

    pub fn as_level_listener_mut(&mut self) -> Option<&mut dyn LevelListener> {
        match self {
            Handler::LevelListener(l) => Some(l.as_mut()),
            _ => None,
        }
    }

    /// Hook run right before a leaf below this handler starts executing.
    pub(crate) fn on_execution_start(&mut self, ctx: &ExecutionContext) {
        if let Handler::TimerList(selector) = self {
            selector.start_execution(ctx.handle());
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundSelector> {
        match self {
            Handler::Compound(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pause(&self) -> Option<&PauseHandler> {
        match self {
            Handler::Pause(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pause_mut(&mut self) -> Option<&mut PauseHandler> {
        match self {
            Handler::Pause(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_timeout(&self) -> Option<&TimeoutHandler> {
        match self {
            Handler::Timeout(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_point_adaptor(&self) -> Option<PointAdaptor> {
        match self {
            Handler::PointAdaptor(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_trial_count_evaluator(&self) -> Option<&TrialCountEvaluator> {
        match self {
            Handler::TrialCountEvaluator(e) => Some(e),
            _ => None,
        }
    }

    pub fn key_binding(&self) -> Option<KeyBinding> {
        match self {
            Handler::EscapeKey(h) => h.key_binding(),
            _ => None,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.default_prefix()).finish()
    }
}

macro_rules! impl_from_handler {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Handler {
                fn from(value: $ty) -> Self {
                    Handler::$variant(value)
                }
            }
        )*
    };
}

impl_from_handler! {
    ListSelector => List,
    RandomListSelector => RandomList,
    TimerListSelector => TimerList,
    CompoundSelector => Compound,
    PointsAndLevelHandler => PointsAndLevel,
    PointAdaptor => PointAdaptor,
    PauseHandler => Pause,
    TimeoutHandler => Timeout,
    TrialCountHandler => TrialCount,
    TrialCountEvaluator => TrialCountEvaluator,
    OutcomeFeedbackHandler => OutcomeFeedback,
    ConfidenceRatingHandler => ConfidenceRating,
    EscapeKeyHandler => EscapeKey,
}

impl From<LevelFeedbackListener> for Handler {
    fn from(value: LevelFeedbackListener) -> Self {
        Handler::LevelListener(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn capabilities_follow_handler_kind() {
        let pause = Handler::from(PauseHandler::new(Duration::from_millis(10)));
        assert!(pause.supports(Capability::PauseHandler));
        assert!(pause.supports(Capability::PhaseListener));
        assert!(!pause.supports(Capability::Selector));

        let compound = Handler::from(CompoundSelector::new());
        assert!(compound.supports(Capability::Selector));
        assert!(compound.supports(Capability::PhaseListener));

        let timer = Handler::from(TimerListSelector::new(Duration::from_secs(1)));
        assert!(timer.supports(Capability::ExecutionStart));

        let adaptor = Handler::from(PointAdaptor::Factor(2));
        assert_eq!(adaptor.as_point_adaptor(), Some(PointAdaptor::Factor(2)));
        assert!(adaptor.as_pause().is_none());
    }
}
