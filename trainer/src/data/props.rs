//! Well-known property names.

pub const LEVEL: &str = "level";
pub const LEVEL_CHANGE_DELTA: &str = "levelChangeDelta";

pub const MIN_POINTS: &str = "minPoints";
pub const POINTS: &str = "points";
pub const MAX_POINTS: &str = "maxPoints";
pub const TOTAL_MIN_POINTS: &str = "totalMinPoints";
pub const TOTAL_POINTS: &str = "totalPoints";
pub const TOTAL_MAX_POINTS: &str = "totalMaxPoints";

/// Accumulated points not yet converted into level steps.
pub const LEVEL_TOTAL: &str = "currentLevelTotal";
pub const LEVEL_COUNTER: &str = "levelCounter";
pub const LEVEL_PERFORMANCE: &str = "levelPerformance";
pub const LEVEL_WINDOW_POINTS: &str = "levelWindowPoints";
pub const LEVEL_WINDOW_MAX: &str = "levelWindowMaxPoints";

pub const OUTCOME: &str = "outcome";
pub const RESULT: &str = "result";
pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_FAILURE: &str = "failure";
pub const RATING: &str = "rating";

pub const START_TIME: &str = "startTime";
pub const END_TIME: &str = "endTime";
pub const DURATION_TIME: &str = "durationTime";
pub const DURATION: &str = "duration";
pub const REACTION_TIME: &str = "reactionTime";

pub const DESCRIPTION: &str = "description";
pub const COMPLETED: &str = "completed";
pub const REGISTERED_HANDLER: &str = "registeredPointsAndLevelHandler";
