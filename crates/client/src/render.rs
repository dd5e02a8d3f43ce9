//! Plain-text rendering of projected grids for the terminal.

use sched_core::grid::{Cell, Grid, Partition};
use types::{DayOfWeek, ScheduleEntry, ScheduleStatistics, ScheduleSummary};

fn lesson(e: &ScheduleEntry) -> String {
    format!("{} / {} / {}", e.subject_name, e.teacher_name, e.room_number)
}

fn table(rows: &[Vec<String>]) -> Vec<String> {
    let cols = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..cols)
        .map(|c| rows.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    let line = |row: &Vec<String>| {
        row.iter()
            .zip(&widths)
            .map(|(text, &w)| format!("{text:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        out.push(line(row));
        if i == 0 {
            out.push(
                widths
                    .iter()
                    .map(|w| "-".repeat(*w))
                    .collect::<Vec<_>>()
                    .join("-+-"),
            );
        }
    }
    out
}

pub fn render_grid(grid: &Grid<'_>) -> String {
    if grid.is_empty() {
        return "no lessons scheduled".into();
    }

    let mut rows = vec![std::iter::once("Time".to_string())
        .chain(DayOfWeek::ALL.iter().map(|d| d.as_str().to_string()))
        .collect::<Vec<_>>()];
    for row in &grid.rows {
        let mut cells = vec![row.time.to_string()];
        cells.extend(row.cells.iter().map(|c| match c {
            Cell::Lesson(e) => lesson(e),
            Cell::Empty => "-".into(),
        }));
        rows.push(cells);
    }

    let mut out = table(&rows);
    out.push(String::new());
    out.push(format!(
        "{} lessons, {} teachers, {} rooms",
        grid.counts.entries, grid.counts.teachers, grid.counts.rooms
    ));
    for c in &grid.conflicts {
        let hidden: Vec<String> = c.shadowed.iter().map(|e| lesson(e)).collect();
        out.push(format!(
            "conflict at {}: showing {}, hidden {}",
            c.slot,
            lesson(c.kept),
            hidden.join("; ")
        ));
    }
    out.join("\n")
}

pub fn render_partitions(parts: &[Partition<'_>]) -> String {
    if parts.is_empty() {
        return "no lessons scheduled".into();
    }
    parts
        .iter()
        .map(|p| format!("== {} ==\n{}", p.label, render_grid(&p.grid)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_summaries(list: &[ScheduleSummary]) -> String {
    if list.is_empty() {
        return "no schedules yet".into();
    }
    let mut rows = vec![["Id", "Name", "Created", "Fitness", "Time (s)"]
        .map(String::from)
        .to_vec()];
    rows.extend(list.iter().map(|s| {
        vec![
            s.id.to_string(),
            s.name.clone(),
            s.created_at.clone().unwrap_or_else(|| "-".into()),
            format!("{:.4}", s.fitness_score),
            format!("{:.2}", s.execution_time),
        ]
    }));
    table(&rows).join("\n")
}

pub fn render_statistics(stats: &ScheduleStatistics) -> String {
    let avg = |v: Option<f64>, digits: usize| match v {
        Some(v) => format!("{v:.digits$}"),
        None => "-".into(),
    };
    format!(
        "schedules: {}\naverage fitness: {}\naverage runtime (s): {}",
        stats.total_schedules,
        avg(stats.avg_fitness_score, 4),
        avg(stats.avg_execution_time, 2)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::grid::{project, project_by, GroupBy};

    fn entry(slot: &str, subject: &str, teacher: &str, room: &str) -> ScheduleEntry {
        ScheduleEntry {
            slot: slot.parse().unwrap(),
            subject_id: subject.into(),
            subject_name: subject.into(),
            teacher_id: teacher.into(),
            teacher_name: teacher.into(),
            room_id: room.into(),
            room_number: room.into(),
        }
    }

    #[test]
    fn weekly_grid() {
        let entries = vec![
            entry("Mon-09:00", "Math", "Somchai", "101"),
            entry("Wed-08:00", "Art", "Malee", "202"),
            entry("Mon-08:00", "Math", "Somchai", "101"),
        ];
        insta::assert_snapshot!(render_grid(&project(&entries)), @r"
        Time  | Mon                  | Tue | Wed               | Thu | Fri
        ------+----------------------+-----+-------------------+-----+----
        08:00 | Math / Somchai / 101 | -   | Art / Malee / 202 | -   | -
        09:00 | Math / Somchai / 101 | -   | -                 | -   | -

        3 lessons, 2 teachers, 2 rooms
        ");
    }

    #[test]
    fn conflicts_are_listed_under_the_grid() {
        let entries = vec![
            entry("Tue-10:00", "Math", "Somchai", "101"),
            entry("Tue-10:00", "Art", "Malee", "202"),
        ];
        insta::assert_snapshot!(render_grid(&project(&entries)), @r"
        Time  | Mon | Tue               | Wed | Thu | Fri
        ------+-----+-------------------+-----+-----+----
        10:00 | -   | Art / Malee / 202 | -   | -   | -

        2 lessons, 2 teachers, 2 rooms
        conflict at Tue-10:00: showing Art / Malee / 202, hidden Math / Somchai / 101
        ");
    }

    #[test]
    fn per_teacher_sections() {
        let entries = vec![
            entry("Mon-08:00", "Math", "Somchai", "101"),
            entry("Fri-13:00", "Art", "Malee", "202"),
        ];
        let text = render_partitions(&project_by(&entries, GroupBy::Teacher));
        insta::assert_snapshot!(text, @r"
        == Malee ==
        Time  | Mon | Tue | Wed | Thu | Fri
        ------+-----+-----+-----+-----+------------------
        13:00 | -   | -   | -   | -   | Art / Malee / 202

        1 lessons, 1 teachers, 1 rooms

        == Somchai ==
        Time  | Mon                  | Tue | Wed | Thu | Fri
        ------+----------------------+-----+-----+-----+----
        08:00 | Math / Somchai / 101 | -   | -   | -   | -

        1 lessons, 1 teachers, 1 rooms
        ");
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(render_grid(&project(&[])), "no lessons scheduled");
        assert_eq!(render_partitions(&[]), "no lessons scheduled");
        assert_eq!(render_summaries(&[]), "no schedules yet");
    }

    #[test]
    fn statistics_without_schedules() {
        let text = render_statistics(&ScheduleStatistics::default());
        assert_eq!(text, "schedules: 0\naverage fitness: -\naverage runtime (s): -");

        let text = render_statistics(&ScheduleStatistics {
            total_schedules: 2,
            avg_fitness_score: Some(0.91234),
            avg_execution_time: Some(3.0),
        });
        assert_eq!(text, "schedules: 2\naverage fitness: 0.9123\naverage runtime (s): 3.00");
    }
}
