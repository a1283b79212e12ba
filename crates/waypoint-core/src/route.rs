//! Route table: the fixed set of known multi-stop paths.
//!
//! A journey's route is the slice of the first table row that contains both the
//! origin and the destination, with the origin appearing first.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Ordered location names: origin, intermediate stops, destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    stops: Vec<String>,
}

impl Route {
    /// Build a route; needs at least an origin and a destination.
    pub fn new(stops: Vec<String>) -> CoreResult<Self> {
        if stops.len() < 2 {
            return Err(CoreError::InvalidJourney(format!(
                "route needs at least two stops, got {}",
                stops.len()
            )));
        }
        Ok(Self { stops })
    }

    pub fn origin(&self) -> &str {
        &self.stops[0]
    }

    pub fn destination(&self) -> &str {
        &self.stops[self.stops.len() - 1]
    }

    /// Stops strictly between origin and destination.
    pub fn intermediate(&self) -> &[String] {
        &self.stops[1..self.stops.len() - 1]
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.stops.get(index).map(String::as_str)
    }

    /// `A → B → C`
    pub fn joined(&self) -> String {
        self.stops.join(" → ")
    }
}

/// All known paths, in file order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rows: Vec<Vec<String>>,
}

impl RouteTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Parse CSV text: one path per record, fields trimmed, empty fields and
    /// blank lines dropped. A leading BOM is ignored.
    pub fn parse(text: &str) -> CoreResult<Self> {
        Self::from_csv(text.as_bytes())
    }

    /// Read and parse a route CSV file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let table = Self::from_csv(bytes.as_slice())?;
        info!(path = %path.display(), rows = table.rows.len(), "Loaded route table");
        Ok(table)
    }

    fn from_csv(bytes: &[u8]) -> CoreResult<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| CoreError::Parse(format!("route table: {}", e)))?;
            let row: Vec<String> = record
                .iter()
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
            if !row.is_empty() {
                rows.push(row);
            }
        }
        debug!(rows = rows.len(), "Parsed route table");
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Unique locations in first-seen order (for origin/destination pickers).
    pub fn locations(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .flatten()
            .filter(|loc| seen.insert(loc.as_str()))
            .cloned()
            .collect()
    }

    /// First row containing `origin` before `destination`, sliced to `origin..=destination`.
    pub fn find_route(&self, origin: &str, destination: &str) -> Option<Route> {
        self.rows.iter().find_map(|row| {
            let start = row.iter().position(|s| s == origin)?;
            let end = row.iter().position(|s| s == destination)?;
            if start < end {
                Some(Route {
                    stops: row[start..=end].to_vec(),
                })
            } else {
                None
            }
        })
    }

    /// Like [`find_route`](Self::find_route) but reports [`CoreError::RouteNotFound`].
    pub fn require_route(&self, origin: &str, destination: &str) -> CoreResult<Route> {
        self.find_route(origin, destination)
            .ok_or_else(|| CoreError::RouteNotFound {
                origin: origin.to_string(),
                destination: destination.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\u{feff}Times Square, Bryant Park,Grand Central , Central Park\n\
                         \n\
                         Wall Street,City Hall,,Union Square\n\
                         Union Square,Times Square,Central Park\n";

    #[test]
    fn test_parse_trims_and_skips_empty() {
        let table = RouteTable::parse(TABLE).expect("table");
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.find_route("Wall Street", "Union Square").expect("route").stops(),
            &["Wall Street", "City Hall", "Union Square"]
        );
    }

    #[test]
    fn test_find_route_full_row() {
        let table = RouteTable::new(vec![vec!["A".into(), "B".into(), "C".into(), "D".into()]]);
        let route = table.find_route("A", "D").expect("route");
        assert_eq!(route.stops(), &["A", "B", "C", "D"]);
        assert_eq!(route.origin(), "A");
        assert_eq!(route.destination(), "D");
        assert_eq!(route.intermediate(), &["B", "C"]);
    }

    #[test]
    fn test_find_route_slices_and_respects_order() {
        let table = RouteTable::parse(TABLE).expect("table");
        let route = table.find_route("Bryant Park", "Central Park").expect("route");
        assert_eq!(route.joined(), "Bryant Park → Grand Central → Central Park");
        assert!(table.find_route("Central Park", "Times Square").is_none());
    }

    #[test]
    fn test_first_matching_row_wins() {
        let table = RouteTable::parse(TABLE).expect("table");
        let route = table.find_route("Times Square", "Central Park").expect("route");
        assert_eq!(route.len(), 4);
    }

    #[test]
    fn test_require_route_reports_not_found() {
        let table = RouteTable::parse(TABLE).expect("table");
        let err = table.require_route("Times Square", "Wall Street").unwrap_err();
        assert!(matches!(err, CoreError::RouteNotFound { .. }));
    }

    #[test]
    fn test_locations_unique_in_order() {
        let table = RouteTable::parse(TABLE).expect("table");
        let locations = table.locations();
        assert_eq!(locations[0], "Times Square");
        assert_eq!(locations.iter().filter(|l| *l == "Central Park").count(), 1);
        assert_eq!(locations.len(), 7);
    }

    #[test]
    fn test_parse_keeps_quoted_commas() {
        let table = RouteTable::parse("\"Lincoln Center, Plaza\",Columbus Circle\n").expect("table");
        let route = table.find_route("Lincoln Center, Plaza", "Columbus Circle").expect("route");
        assert_eq!(route.len(), 2);
    }

    #[test]
    fn test_load_reads_file_with_bom() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("routes.csv");
        std::fs::write(&path, "\u{feff}Times Square,Bryant Park\n").expect("write routes");
        let table = RouteTable::load(&path).expect("load");
        assert_eq!(table.locations(), vec!["Times Square", "Bryant Park"]);
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("routes.csv");
        std::fs::write(&path, b"Times Square,\xff\xfe\n").expect("write routes");
        let err = RouteTable::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
    }

    #[test]
    fn test_route_requires_two_stops() {
        assert!(Route::new(vec!["Solo".into()]).is_err());
    }
}
