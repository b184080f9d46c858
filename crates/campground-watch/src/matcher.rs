use tracing::debug;

use crate::scan_types::{AvailabilitySnapshot, Match, SiteAvailability, WatchDefinition, WatchError};

/// Find the (site, date) pairs of `snapshot` that satisfy `watch`.
///
/// Only dates inside the snapshot's month are considered. The result is
/// ordered by date, then site ID, so repeated calls on the same input give
/// the same sequence.
pub fn evaluate(
    watch: &WatchDefinition,
    snapshot: &AvailabilitySnapshot,
) -> Result<Vec<Match>, WatchError> {
    if snapshot.campground_id != watch.campground_id {
        return Err(WatchError::UnknownCampground {
            expected: watch.campground_id,
            actual: snapshot.campground_id,
        });
    }

    let mut matches = Vec::new();

    for (site_id, site) in &snapshot.sites {
        if !site_allowed(watch, site_id, site) {
            continue;
        }

        for date in watch
            .dates
            .iter()
            .filter(|date| snapshot.month.contains(**date))
        {
            let Some(status) = site.availabilities.get(date) else {
                continue;
            };

            if status.is_positive() {
                matches.push(Match {
                    watch_id: watch.id,
                    campground_id: watch.campground_id,
                    site_id: site_id.clone(),
                    site_name: site
                        .metadata
                        .site_name
                        .clone()
                        .unwrap_or_else(|| site_id.clone()),
                    date: *date,
                });
            }
        }
    }

    matches.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.site_id.cmp(&b.site_id)));

    debug!(
        "Watch '{}' matched {} site-nights in {}",
        watch.campground_name,
        matches.len(),
        snapshot.month
    );

    Ok(matches)
}

/// Apply the watch's site and loop restrictions
fn site_allowed(watch: &WatchDefinition, site_id: &str, site: &SiteAvailability) -> bool {
    if let Some(ref wanted) = watch.site {
        let name_matches = site.metadata.site_name.as_deref() == Some(wanted.as_str());
        if site_id != wanted && !name_matches {
            return false;
        }
    }

    match (&watch.loops, &site.metadata.loop_name) {
        (None, _) => true,
        (Some(loops), Some(loop_name)) => loops.contains(loop_name),
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::scan_types::{AvailabilityStatus, CampsiteMetadata, ReservationMonth};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn site(
        name: &str,
        loop_name: Option<&str>,
        statuses: &[(NaiveDate, AvailabilityStatus)],
    ) -> SiteAvailability {
        SiteAvailability {
            metadata: CampsiteMetadata {
                site_name: Some(name.to_string()),
                loop_name: loop_name.map(str::to_string),
                ..Default::default()
            },
            availabilities: statuses.iter().copied().collect(),
        }
    }

    fn snapshot(campground_id: u64, sites: Vec<(&str, SiteAvailability)>) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            campground_id,
            month: ReservationMonth::containing(date(2025, 7, 1)),
            sites: sites
                .into_iter()
                .map(|(id, site)| (id.to_string(), site))
                .collect::<BTreeMap<_, _>>(),
            fetched_at: Utc::now(),
        }
    }

    fn watch(dates: &[NaiveDate]) -> WatchDefinition {
        WatchDefinition::new(
            "Test Campground",
            1000,
            dates.iter().copied(),
            ["camper@example.com".to_string()],
        )
    }

    #[test]
    fn test_single_available_night() {
        let watch = watch(&[date(2025, 7, 4), date(2025, 7, 5)]);
        let snapshot = snapshot(
            1000,
            vec![(
                "A001",
                site(
                    "A001",
                    None,
                    &[
                        (date(2025, 7, 4), AvailabilityStatus::Available),
                        (date(2025, 7, 5), AvailabilityStatus::NotAvailable),
                    ],
                ),
            )],
        );

        let matches = evaluate(&watch, &snapshot).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].site_id, "A001");
        assert_eq!(matches[0].date, date(2025, 7, 4));
        assert_eq!(matches[0].watch_id, watch.id);
        assert_eq!(matches[0].campground_id, 1000);
    }

    #[test]
    fn test_only_available_and_open_match() {
        let night = date(2025, 7, 10);
        let watch = watch(&[night]);
        let statuses = [
            ("S1", AvailabilityStatus::Available),
            ("S2", AvailabilityStatus::NotAvailable),
            ("S3", AvailabilityStatus::NotReservable),
            ("S4", AvailabilityStatus::NotReservableManagement),
            ("S5", AvailabilityStatus::Open),
            ("S6", AvailabilityStatus::Reserved),
        ];
        let snapshot = snapshot(
            1000,
            statuses
                .iter()
                .map(|(id, status)| (*id, site(id, None, &[(night, *status)])))
                .collect(),
        );

        let sites: Vec<String> = evaluate(&watch, &snapshot)
            .unwrap()
            .into_iter()
            .map(|m| m.site_id)
            .collect();

        assert_eq!(sites, vec!["S1", "S5"]);
    }

    #[test]
    fn test_ordering_is_date_then_site() {
        let watch = watch(&[date(2025, 7, 4), date(2025, 7, 5)]);
        let both = [
            (date(2025, 7, 4), AvailabilityStatus::Available),
            (date(2025, 7, 5), AvailabilityStatus::Available),
        ];
        let snapshot = snapshot(
            1000,
            vec![
                ("B002", site("B002", None, &both)),
                ("A001", site("A001", None, &both)),
            ],
        );

        let first = evaluate(&watch, &snapshot).unwrap();
        let order: Vec<(NaiveDate, &str)> = first
            .iter()
            .map(|m| (m.date, m.site_id.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![
                (date(2025, 7, 4), "A001"),
                (date(2025, 7, 4), "B002"),
                (date(2025, 7, 5), "A001"),
                (date(2025, 7, 5), "B002"),
            ]
        );

        let second = evaluate(&watch, &snapshot).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_site_restriction_by_id_or_name() {
        let night = date(2025, 7, 4);
        let open = [(night, AvailabilityStatus::Available)];
        let snapshot = snapshot(
            1000,
            vec![
                ("84213", site("A001", None, &open)),
                ("84214", site("A002", None, &open)),
            ],
        );

        let by_name = evaluate(&watch(&[night]).with_site("A002"), &snapshot).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].site_id, "84214");
        assert_eq!(by_name[0].site_name, "A002");

        let by_id = evaluate(&watch(&[night]).with_site("84213"), &snapshot).unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].site_name, "A001");

        let missing = evaluate(&watch(&[night]).with_site("Z999"), &snapshot).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_loop_restriction() {
        let night = date(2025, 7, 4);
        let open = [(night, AvailabilityStatus::Available)];
        let snapshot = snapshot(
            1000,
            vec![
                ("A001", site("A001", Some("Loop A"), &open)),
                ("B001", site("B001", Some("Loop B"), &open)),
                ("X001", site("X001", None, &open)),
            ],
        );

        let restricted = watch(&[night]).with_loops(["Loop B".to_string()]);
        let matches = evaluate(&restricted, &snapshot).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].site_id, "B001");

        let unrestricted = evaluate(&watch(&[night]), &snapshot).unwrap();
        assert_eq!(unrestricted.len(), 3);
    }

    #[test]
    fn test_dates_outside_snapshot_month_are_ignored() {
        let watch = watch(&[date(2025, 7, 31), date(2025, 8, 1)]);
        let mut stray = site("A001", None, &[(date(2025, 7, 31), AvailabilityStatus::Available)]);
        // Some months leak the first night of the next month.
        stray
            .availabilities
            .insert(date(2025, 8, 1), AvailabilityStatus::Available);
        let snapshot = snapshot(1000, vec![("A001", stray)]);

        let matches = evaluate(&watch, &snapshot).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].date, date(2025, 7, 31));
    }

    #[test]
    fn test_unknown_campground() {
        let watch = watch(&[date(2025, 7, 4)]);
        let snapshot = snapshot(2000, vec![]);

        assert_eq!(
            evaluate(&watch, &snapshot),
            Err(WatchError::UnknownCampground {
                expected: 1000,
                actual: 2000,
            })
        );
    }
}
