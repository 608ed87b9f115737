//! Itinerary build pipeline and in-process build registry.
//!
//! A build is a background task: one planner generation call, one
//! points-of-interest call, then link substitution over the itinerary text.
//! The registry tracks each build's phase under a monotonically increasing
//! generation id; the session stores only the newest id for the browser, so
//! a superseded build's result is simply never read again.
//!
//! While a build runs, timed ticks advance the status message so the visitor
//! sees progress. Ticks re-check the phase before writing and never clobber
//! a finished build.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::instrument;

use super::planner::{PlannerClient, PlannerError};

/// Initial status message.
const MSG_BUILDING: &str = "Building itinerary...";

/// Status message after [`TICK_FIRST`].
const MSG_GETTING_CLOSER: &str = "Getting closer ...";

/// Status message after [`TICK_SECOND`].
const MSG_ALMOST_THERE: &str = "Almost there ...";

/// User-visible message for a failed build.
const MSG_FAILED: &str = "Could not build itinerary, please retry.";

/// First status tick.
const TICK_FIRST: Duration = Duration::from_secs(7);

/// Second status tick.
const TICK_SECOND: Duration = Duration::from_secs(15);

/// How long finished builds stay addressable before eviction.
const BUILD_TTL: Duration = Duration::from_secs(30 * 60);

/// Registry capacity; builds are tiny, this bounds a pathological burst.
const BUILD_CAPACITY: u64 = 10_000;

/// Phase of a registered build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPhase {
    /// The pipeline is still running; `message` is the current status line.
    Running {
        /// Current user-facing status message.
        message: String,
    },
    /// The pipeline finished; `markdown` is the linked itinerary text.
    Ready {
        /// Final itinerary markdown with points of interest linked.
        markdown: String,
    },
    /// The pipeline failed; `message` is safe to show the visitor.
    Failed {
        /// User-facing failure message.
        message: String,
    },
}

/// In-process registry of itinerary builds.
#[derive(Clone)]
pub struct BuildRegistry {
    jobs: Cache<u64, BuildPhase>,
    next_id: Arc<AtomicU64>,
}

impl Default for BuildRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Cache::builder()
                .max_capacity(BUILD_CAPACITY)
                .time_to_live(BUILD_TTL)
                .build(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Current phase of a build, if it is still addressable.
    pub async fn phase(&self, id: u64) -> Option<BuildPhase> {
        self.jobs.get(&id).await
    }

    /// Register and start a new build, returning its generation id.
    ///
    /// The pipeline and its status ticks run on spawned tasks; the returned
    /// id is what the caller stores in the session as the browser's current
    /// build.
    pub async fn start(&self, planner: PlannerClient, city: String, days: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.jobs
            .insert(
                id,
                BuildPhase::Running {
                    message: MSG_BUILDING.to_string(),
                },
            )
            .await;

        self.spawn_tick(id, TICK_FIRST, MSG_GETTING_CLOSER);
        self.spawn_tick(id, TICK_SECOND, MSG_ALMOST_THERE);

        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let phase = match run_pipeline(&planner, &days, &city).await {
                Ok(markdown) => BuildPhase::Ready { markdown },
                Err(e) => {
                    tracing::error!(error = %e, city = %city, "Itinerary build failed");
                    sentry::capture_error(&e);
                    BuildPhase::Failed {
                        message: MSG_FAILED.to_string(),
                    }
                }
            };
            jobs.insert(id, phase).await;
        });

        id
    }

    /// Spawn a delayed status-message update for a running build.
    fn spawn_tick(&self, id: u64, delay: Duration, message: &'static str) {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Only advance the message while the build is still running.
            if matches!(jobs.get(&id).await, Some(BuildPhase::Running { .. })) {
                jobs.insert(
                    id,
                    BuildPhase::Running {
                        message: message.to_string(),
                    },
                )
                .await;
            }
        });
    }
}

/// Run the two planner calls and link the result.
#[instrument(skip(planner))]
async fn run_pipeline(
    planner: &PlannerClient,
    days: &str,
    city: &str,
) -> Result<String, PlannerError> {
    let draft = planner.generate(days, city).await?;
    let points = planner
        .points_of_interest(&draft.points_of_interest_prompt)
        .await?;
    tracing::debug!(count = points.len(), "Points of interest extracted");
    Ok(link_points(&draft.itinerary, &points, city))
}

/// Rewrite each point of interest into an outbound search link.
///
/// Replacement is first-occurrence-only, in array order; a point that does
/// not appear verbatim in the text is skipped. A point whose name overlaps
/// an earlier substitution can corrupt the inserted link syntax; known
/// limitation, kept as-is.
#[must_use]
pub fn link_points(itinerary: &str, points: &[String], city: &str) -> String {
    let mut text = itinerary.to_string();
    for point in points {
        if let Some(at) = text.find(point.as_str()) {
            let link = format!("[{point}]({})", search_url(point, city));
            text.replace_range(at..at + point.len(), &link);
        }
    }
    text
}

/// Web-search URL for a point of interest in a city.
fn search_url(point: &str, city: &str) -> String {
    format!(
        "https://www.google.com/search?q={}",
        urlencoding::encode(&format!("{point} {city}"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_link_points_substitutes_search_link() {
        let out = link_points("Visit Eiffel Tower today", &points(&["Eiffel Tower"]), "Paris");
        assert_eq!(
            out,
            "Visit [Eiffel Tower](https://www.google.com/search?q=Eiffel%20Tower%20Paris) today"
        );
    }

    #[test]
    fn test_link_points_skips_absent_point() {
        let out = link_points("Visit the river today", &points(&["Eiffel Tower"]), "Paris");
        assert_eq!(out, "Visit the river today");
    }

    #[test]
    fn test_link_points_first_occurrence_only() {
        let out = link_points("Louvre, then Louvre again", &points(&["Louvre"]), "Paris");
        assert_eq!(
            out,
            "[Louvre](https://www.google.com/search?q=Louvre%20Paris), then Louvre again"
        );
    }

    #[test]
    fn test_link_points_array_order() {
        let out = link_points(
            "See the Louvre and Notre Dame",
            &points(&["Notre Dame", "Louvre"]),
            "Paris",
        );
        assert!(out.contains("[Notre Dame](https://www.google.com/search?q=Notre%20Dame%20Paris)"));
        assert!(out.contains("[Louvre](https://www.google.com/search?q=Louvre%20Paris)"));
    }

    #[test]
    fn test_link_points_overlapping_names_known_limitation() {
        // "Tower" is a substring of the already-inserted link text; the later
        // replacement lands inside the earlier link. Documented limitation.
        let out = link_points("See Eiffel Tower", &points(&["Eiffel Tower", "Tower"]), "Paris");
        assert!(out.starts_with("See [Eiffel [Tower]"));
    }

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            search_url("Eiffel Tower", "Paris"),
            "https://www.google.com/search?q=Eiffel%20Tower%20Paris"
        );
    }

    #[tokio::test]
    async fn test_registry_ids_are_unique_and_increasing() {
        let registry = BuildRegistry::new();
        let a = registry.next_id.fetch_add(1, Ordering::Relaxed);
        let b = registry.next_id.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_registry_phase_of_unknown_build() {
        let registry = BuildRegistry::new();
        assert_eq!(registry.phase(42).await, None);
    }
}
