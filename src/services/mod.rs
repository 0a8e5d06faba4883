mod goals;
mod relationships;
mod resources;

pub use goals::{GoalPatch, GoalService, NewGoal, NewTimeLog};
pub use relationships::RelationshipService;
pub use resources::{ResourcePatch, ResourceService};
