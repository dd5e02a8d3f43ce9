//! Day x time projection of a schedule's entries.
//!
//! The optimizer promises one entry per (day, time) slot. The projector does
//! not trust that: when several entries share a slot, the one appearing last in
//! the input is placed in the grid and the others are listed in
//! [`Grid::conflicts`]. Projection never fails.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use types::{DayOfWeek, ScheduleEntry, SlotKey, TimeLabel};

use crate::CoreError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell<'a> {
    Empty,
    Lesson(&'a ScheduleEntry),
}

impl<'a> Cell<'a> {
    pub fn entry(&self) -> Option<&'a ScheduleEntry> {
        match *self {
            Cell::Lesson(e) => Some(e),
            Cell::Empty => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridRow<'a> {
    pub time: &'a TimeLabel,
    /// Mon..Fri.
    pub cells: [Cell<'a>; 5],
}

impl<'a> GridRow<'a> {
    pub fn cell(&self, day: DayOfWeek) -> Cell<'a> {
        self.cells[day.index()]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridCounts {
    pub entries: usize,
    pub teachers: usize,
    pub rooms: usize,
}

/// Entries that lost their slot to a later entry with the same key.
#[derive(Clone, Debug, PartialEq)]
pub struct Conflict<'a> {
    pub slot: &'a SlotKey,
    pub kept: &'a ScheduleEntry,
    /// In input order.
    pub shadowed: Vec<&'a ScheduleEntry>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid<'a> {
    pub rows: Vec<GridRow<'a>>,
    pub counts: GridCounts,
    /// Ordered by slot.
    pub conflicts: Vec<Conflict<'a>>,
}

impl<'a> Grid<'a> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, day: DayOfWeek, time: &str) -> Cell<'a> {
        self.rows
            .iter()
            .find(|r| r.time.as_str() == time)
            .map(|r| r.cell(day))
            .unwrap_or(Cell::Empty)
    }
}

pub fn project(entries: &[ScheduleEntry]) -> Grid<'_> {
    project_refs(entries.iter())
}

fn project_refs<'a>(entries: impl IntoIterator<Item = &'a ScheduleEntry>) -> Grid<'a> {
    let mut by_slot: BTreeMap<(DayOfWeek, &TimeLabel), &ScheduleEntry> = BTreeMap::new();
    let mut shadowed: BTreeMap<&SlotKey, Vec<&ScheduleEntry>> = BTreeMap::new();
    let mut times: BTreeSet<&TimeLabel> = BTreeSet::new();
    let mut teachers: HashSet<&str> = HashSet::new();
    let mut rooms: HashSet<&str> = HashSet::new();
    let mut total = 0usize;

    for e in entries {
        total += 1;
        times.insert(&e.slot.time);
        teachers.insert(e.teacher_id.as_str());
        rooms.insert(e.room_id.as_str());
        if let Some(prev) = by_slot.insert((e.slot.day, &e.slot.time), e) {
            shadowed.entry(&e.slot).or_default().push(prev);
        }
    }

    let rows = times
        .into_iter()
        .map(|time| GridRow {
            time,
            cells: DayOfWeek::ALL.map(|day| match by_slot.get(&(day, time)) {
                Some(e) => Cell::Lesson(*e),
                None => Cell::Empty,
            }),
        })
        .collect();

    let conflicts = shadowed
        .into_iter()
        .filter_map(|(slot, shadowed)| {
            let kept = *by_slot.get(&(slot.day, &slot.time))?;
            Some(Conflict {
                slot,
                kept,
                shadowed,
            })
        })
        .collect();

    Grid {
        rows,
        counts: GridCounts {
            entries: total,
            teachers: teachers.len(),
            rooms: rooms.len(),
        },
        conflicts,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Teacher,
    Room,
    Subject,
}

impl GroupBy {
    fn key<'a>(&self, e: &'a ScheduleEntry) -> (&'a str, &'a str) {
        match self {
            GroupBy::Teacher => (e.teacher_id.as_str(), e.teacher_name.as_str()),
            GroupBy::Room => (e.room_id.as_str(), e.room_number.as_str()),
            GroupBy::Subject => (e.subject_id.as_str(), e.subject_name.as_str()),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupBy::Teacher => "teacher",
            GroupBy::Room => "room",
            GroupBy::Subject => "subject",
        })
    }
}

impl FromStr for GroupBy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teacher" => Ok(GroupBy::Teacher),
            "room" => Ok(GroupBy::Room),
            "subject" => Ok(GroupBy::Subject),
            other => Err(CoreError::Validation(format!("unknown grouping: {other}"))),
        }
    }
}

/// One teacher's (room's, subject's) share of the schedule.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition<'a> {
    pub key: &'a str,
    /// Display name taken from the first entry of the partition.
    pub label: &'a str,
    pub grid: Grid<'a>,
}

/// Partitions are ordered by label, then key.
pub fn project_by(entries: &[ScheduleEntry], by: GroupBy) -> Vec<Partition<'_>> {
    let mut groups: BTreeMap<&str, (&str, Vec<&ScheduleEntry>)> = BTreeMap::new();
    for e in entries {
        let (key, label) = by.key(e);
        groups.entry(key).or_insert_with(|| (label, Vec::new())).1.push(e);
    }

    let mut parts: Vec<Partition<'_>> = groups
        .into_iter()
        .map(|(key, (label, members))| Partition {
            key,
            label,
            grid: project_refs(members),
        })
        .collect();
    parts.sort_by(|a, b| (a.label, a.key).cmp(&(b.label, b.key)));
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slot: &str, subject: &str, teacher: &str, room: &str) -> ScheduleEntry {
        ScheduleEntry {
            slot: slot.parse().unwrap(),
            subject_id: subject.into(),
            subject_name: format!("Subject {subject}"),
            teacher_id: teacher.into(),
            teacher_name: format!("Teacher {teacher}"),
            room_id: room.into(),
            room_number: format!("R{room}"),
        }
    }

    #[test]
    fn empty_input_gives_empty_grid() {
        let g = project(&[]);
        assert!(g.is_empty());
        assert_eq!(g.counts, GridCounts::default());
        assert!(g.conflicts.is_empty());
    }

    #[test]
    fn rows_follow_clock_order_with_five_cells() {
        let entries = vec![
            entry("Wed-13:00", "1", "a", "x"),
            entry("Mon-08:00", "2", "b", "x"),
            entry("Fri-9:00", "3", "a", "y"),
        ];
        let g = project(&entries);
        let times: Vec<&str> = g.rows.iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, ["08:00", "9:00", "13:00"]);
        assert!(g.rows.iter().all(|r| r.cells.len() == 5));

        assert_eq!(g.rows[0].cell(DayOfWeek::Mon).entry(), Some(&entries[1]));
        assert_eq!(g.rows[0].cell(DayOfWeek::Tue), Cell::Empty);
        assert_eq!(g.lookup(DayOfWeek::Fri, "9:00").entry(), Some(&entries[2]));
        assert_eq!(g.lookup(DayOfWeek::Fri, "17:00"), Cell::Empty);

        assert_eq!(
            g.counts,
            GridCounts {
                entries: 3,
                teachers: 2,
                rooms: 2
            }
        );
    }

    #[test]
    fn later_entry_wins_a_shared_slot() {
        let entries = vec![
            entry("Tue-10:00", "1", "a", "x"),
            entry("Tue-10:00", "2", "b", "y"),
            entry("Tue-10:00", "3", "c", "z"),
        ];
        for _ in 0..3 {
            let g = project(&entries);
            assert_eq!(g.rows.len(), 1);
            assert_eq!(g.lookup(DayOfWeek::Tue, "10:00").entry(), Some(&entries[2]));
            assert_eq!(g.conflicts.len(), 1);
            assert_eq!(g.conflicts[0].kept, &entries[2]);
            assert_eq!(g.conflicts[0].shadowed, vec![&entries[0], &entries[1]]);
            assert_eq!(g.counts.entries, 3);
        }
    }

    #[test]
    fn malformed_time_labels_are_kept() {
        let entries = vec![entry("Mon-lunch", "1", "a", "x"), entry("Mon-08:00", "2", "a", "x")];
        let g = project(&entries);
        let times: Vec<&str> = g.rows.iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, ["08:00", "lunch"]);
    }

    #[test]
    fn partitions_by_teacher() {
        let entries = vec![
            entry("Mon-08:00", "1", "b", "x"),
            entry("Mon-08:00", "2", "a", "y"),
            entry("Tue-09:00", "3", "a", "x"),
        ];
        let parts = project_by(&entries, GroupBy::Teacher);
        let labels: Vec<&str> = parts.iter().map(|p| p.label).collect();
        assert_eq!(labels, ["Teacher a", "Teacher b"]);

        // the shared Monday slot is no conflict once split per teacher
        assert!(parts.iter().all(|p| p.grid.conflicts.is_empty()));
        assert_eq!(parts[0].grid.rows.len(), 2);
        assert_eq!(parts[0].grid.counts.entries, 2);
        assert_eq!(parts[1].grid.rows.len(), 1);
    }

    #[test]
    fn partitions_by_room_keep_tie_break() {
        let entries = vec![
            entry("Thu-11:00", "1", "a", "x"),
            entry("Thu-11:00", "2", "b", "x"),
        ];
        let parts = project_by(&entries, GroupBy::Room);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].key, "x");
        assert_eq!(
            parts[0].grid.lookup(DayOfWeek::Thu, "11:00").entry(),
            Some(&entries[1])
        );
        assert_eq!(parts[0].grid.conflicts.len(), 1);
    }

    #[test]
    fn group_by_parses() {
        assert_eq!("Subject".parse::<GroupBy>().unwrap(), GroupBy::Subject);
        assert!("day".parse::<GroupBy>().is_err());
    }
}
