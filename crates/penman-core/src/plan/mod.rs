//! Article outline: data model, response parsing and the planner stage.

pub mod parser;
pub mod planner;
pub mod prompt;
pub mod repair;
pub mod types;

pub use parser::{PlanParseError, parse_plan_response};
pub use planner::{ArticlePlanner, PlanGenerationError, PlannerConfig};
pub use prompt::PLAN_MARKER;
pub use repair::{repair_json, strip_code_fence};
pub use types::{ArticlePlan, BodySlot, Section, Subsection};
