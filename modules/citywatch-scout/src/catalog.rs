// --- Sweep catalog ---

/// Event keywords swept each pass.
pub const EVENTS: &[&str] = &[
    "water logging",
    "tree fall",
    "power outage",
    "traffic congestion",
    "signal failure",
    "road block",
    "potholes",
    "garbage pile-up",
    "sewage overflow",
    "fire incident",
    "metro delay",
    "construction debris",
    "noise complaint",
    "streetlight not working",
    "stray animal alert",
    "accident report",
    "protest",
    "road cave-in",
];

/// Bangalore localities swept each pass.
pub const LOCATIONS: &[&str] = &[
    "Marathahalli",
    "Whitefield",
    "Koramangala",
    "Indiranagar",
    "Jayanagar",
    "HSR Layout",
    "Electronic City",
    "MG Road",
    "Hebbal",
    "Banashankari",
    "Rajajinagar",
    "Yelahanka",
    "Malleshwaram",
    "KR Puram",
    "Bellandur",
    "BTM Layout",
    "Basavanagudi",
    "Silk Board",
    "Sarjapur Road",
    "Majestic",
];

/// One (event, location) pair to investigate in a city.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnomalyTask {
    pub event: String,
    pub location: String,
    pub city: String,
}

impl AnomalyTask {
    pub fn new(
        event: impl Into<String>,
        location: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            event: event.into(),
            location: location.into(),
            city: city.into(),
        }
    }

    /// Natural-language task text sent into the session.
    pub fn description(&self) -> String {
        format!(
            "Search for news related to city anomalies in {} regions based on the event '{}' and location '{}'.",
            self.city, self.event, self.location
        )
    }
}

impl std::fmt::Display for AnomalyTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}, {}", self.event, self.location, self.city)
    }
}

/// Fixed event and location lists for one city.
#[derive(Debug, Clone)]
pub struct Catalog {
    city: String,
    events: Vec<String>,
    locations: Vec<String>,
}

impl Catalog {
    pub fn new(city: impl Into<String>, events: Vec<String>, locations: Vec<String>) -> Self {
        Self {
            city: city.into(),
            events,
            locations,
        }
    }

    /// Built-in event and locality lists under the given city name.
    pub fn builtin(city: impl Into<String>) -> Self {
        Self::new(
            city,
            EVENTS.iter().map(|e| e.to_string()).collect(),
            LOCATIONS.iter().map(|l| l.to_string()).collect(),
        )
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// Number of tasks in one pass.
    pub fn len(&self) -> usize {
        self.events.len() * self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (event, location) pair, event-major: all locations for the first
    /// event, then all locations for the second, and so on.
    pub fn tasks(&self) -> impl Iterator<Item = AnomalyTask> + '_ {
        self.events.iter().flat_map(move |event| {
            self.locations
                .iter()
                .map(move |location| AnomalyTask::new(event, location, &self.city))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_covers_full_cross_product() {
        let catalog = Catalog::builtin("Bangalore");
        assert_eq!(EVENTS.len(), 18);
        assert_eq!(LOCATIONS.len(), 20);
        assert_eq!(catalog.len(), 360);
        assert_eq!(catalog.tasks().count(), 360);
    }

    #[test]
    fn tasks_are_event_major() {
        let catalog = Catalog::new(
            "Bangalore",
            vec!["power outage".into(), "tree fall".into()],
            vec!["Koramangala".into(), "Indiranagar".into(), "Hebbal".into()],
        );
        let order: Vec<(String, String)> = catalog
            .tasks()
            .map(|t| (t.event, t.location))
            .collect();

        assert_eq!(
            order,
            vec![
                ("power outage".into(), "Koramangala".into()),
                ("power outage".into(), "Indiranagar".into()),
                ("power outage".into(), "Hebbal".into()),
                ("tree fall".into(), "Koramangala".into()),
                ("tree fall".into(), "Indiranagar".into()),
                ("tree fall".into(), "Hebbal".into()),
            ]
        );
    }

    #[test]
    fn empty_list_yields_no_tasks() {
        let catalog = Catalog::new("Bangalore", vec!["protest".into()], vec![]);
        assert!(catalog.is_empty());
        assert_eq!(catalog.tasks().count(), 0);
    }

    #[test]
    fn description_names_city_event_and_location() {
        let task = AnomalyTask::new("power outage", "Indiranagar", "Bangalore");
        assert_eq!(
            task.description(),
            "Search for news related to city anomalies in Bangalore regions based on the event 'power outage' and location 'Indiranagar'."
        );
    }
}
