use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Fixed lookup table of activities goals and time logs may reference. Owned
/// by the platform, not by this core; injected so tests can substitute it.
pub trait ActivityCatalog: Send + Sync {
    fn is_valid_activity(&self, activity_id: &str) -> bool;
}

static PLATFORM_ACTIVITIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut activities = HashSet::new();

    activities.insert("reading");
    activities.insert("listening");
    activities.insert("speaking");
    activities.insert("writing");
    activities.insert("vocabulary");
    activities.insert("grammar");
    activities.insert("conversation");
    activities.insert("media");

    activities
});

/// The platform's built-in activity set.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticActivityCatalog;

impl ActivityCatalog for StaticActivityCatalog {
    fn is_valid_activity(&self, activity_id: &str) -> bool {
        PLATFORM_ACTIVITIES.contains(activity_id)
    }
}
