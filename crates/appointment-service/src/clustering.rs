//! Grouping of pending requests that share a course, date and time

use chrono::NaiveDate;
use classbook_common::{Appointment, AppointmentStatus, ClusterKey, CourseId};
use serde::Serialize;
use std::collections::HashMap;

/// Pending requests eligible for group approval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// `{course_id}-{date}-{time}`
    pub key: String,
    pub course_id: CourseId,
    pub date: NaiveDate,
    pub time: String,
    pub members: Vec<Appointment>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Partition the pending records by [`ClusterKey`].
///
/// Non-pending records are ignored. Clusters are ordered by date; clusters
/// on the same date keep the order in which their first member appeared.
/// Members keep input order.
pub fn cluster_pending(appointments: &[Appointment]) -> Vec<Cluster> {
    let mut positions: HashMap<ClusterKey, usize> = HashMap::new();
    let mut clusters: Vec<Cluster> = Vec::new();

    for appointment in appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Pending)
    {
        let key = appointment.cluster_key();
        match positions.get(&key) {
            Some(&index) => clusters[index].members.push(appointment.clone()),
            None => {
                positions.insert(key.clone(), clusters.len());
                clusters.push(Cluster {
                    key: key.to_string(),
                    course_id: key.course_id,
                    date: key.date,
                    time: key.time,
                    members: vec![appointment.clone()],
                });
            }
        }
    }

    // sort_by_key is stable
    clusters.sort_by_key(|c| c.date);
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use classbook_common::{NewAppointment, UserId};

    fn pending(student: &str, course: &str, day: u32, time: &str) -> Appointment {
        Appointment::new(NewAppointment {
            student_id: UserId::new(student),
            course_id: CourseId::new(course),
            date: NaiveDate::from_ymd_opt(2025, 5, day).unwrap(),
            time: time.to_string(),
            topic: String::new(),
            description: None,
            trainer_id: None,
            duration_minutes: None,
        })
    }

    #[test]
    fn test_three_plus_one_yields_two_clusters() {
        let appointments = vec![
            pending("s1", "c1", 1, "10:00"),
            pending("s2", "c1", 1, "10:00"),
            pending("s3", "c1", 1, "10:00"),
            pending("s4", "c1", 1, "11:00"),
        ];

        let clusters = cluster_pending(&appointments);

        let mut sizes: Vec<usize> = clusters.iter().map(Cluster::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3]);
        assert_eq!(clusters[0].key, "c1-2025-05-01-10:00");
        assert_eq!(clusters[0].members[0].student_id, UserId::new("s1"));
    }

    #[test]
    fn test_non_pending_records_are_ignored() {
        let mut approved = pending("s1", "c1", 1, "10:00");
        approved.mark_approved(Default::default());
        let mut rejected = pending("s2", "c1", 1, "10:00");
        rejected.mark_rejected("full".to_string());

        let appointments = vec![approved, rejected, pending("s3", "c1", 1, "10:00")];
        let clusters = cluster_pending(&appointments);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 1);
    }

    #[test]
    fn test_sorted_by_date_then_first_seen() {
        let appointments = vec![
            pending("s1", "c2", 3, "09:00"),
            pending("s2", "c1", 1, "14:00"),
            pending("s3", "c3", 3, "08:00"),
            pending("s4", "c1", 1, "09:00"),
        ];

        let keys: Vec<String> = cluster_pending(&appointments)
            .into_iter()
            .map(|c| c.key)
            .collect();

        assert_eq!(
            keys,
            vec![
                "c1-2025-05-01-14:00",
                "c1-2025-05-01-09:00",
                "c2-2025-05-03-09:00",
                "c3-2025-05-03-08:00",
            ]
        );
    }

    #[test]
    fn test_time_is_compared_verbatim() {
        let appointments = vec![
            pending("s1", "c1", 1, "9:00"),
            pending("s2", "c1", 1, "09:00"),
        ];
        assert_eq!(cluster_pending(&appointments).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_pending(&[]).is_empty());
    }
}
