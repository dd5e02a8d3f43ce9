use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod wire;

pub use wire::RawEntry;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown weekday: {0}")]
    Day(String),
    #[error("malformed slot key {0:?}, expected <Day>-<time>")]
    Slot(String),
    #[error("schedule entry has no slot: {0}")]
    Entry(String),
    #[error("unknown export format: {0}")]
    Format(String),
    #[error("unknown entity kind: {0}")]
    Kind(String),
    #[error("unknown room type: {0}")]
    RoomType(String),
}

/// Ids arrive as JSON numbers from the CRUD backend and as strings from
/// everywhere else.
#[doc(hidden)]
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[serde(from = "RawId")]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<RawId> for $name {
            fn from(raw: RawId) -> Self {
                Self(raw.into_string())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        // canonical integers go back out as numbers
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                match self.0.parse::<i64>() {
                    Ok(n) if n.to_string() == self.0 => s.serialize_i64(n),
                    _ => s.serialize_str(&self.0),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
id_newtype!(TeacherId);
id_newtype!(SubjectId);
id_newtype!(RoomId);
id_newtype!(ScheduleId);

impl ScheduleId {
    /// Usable as a single URL path segment.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 5] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Mon",
            DayOfWeek::Tue => "Tue",
            DayOfWeek::Wed => "Wed",
            DayOfWeek::Thu => "Thu",
            DayOfWeek::Fri => "Fri",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(DayOfWeek::Mon),
            "tue" | "tuesday" => Ok(DayOfWeek::Tue),
            "wed" | "wednesday" => Ok(DayOfWeek::Wed),
            "thu" | "thursday" => Ok(DayOfWeek::Thu),
            "fri" | "friday" => Ok(DayOfWeek::Fri),
            _ => Err(ParseError::Day(s.to_string())),
        }
    }
}

impl TryFrom<String> for DayOfWeek {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Time-of-day label as shown in the grid ("08:00", "08:00-09:00", or
/// anything else the optimizer emits). Labels beginning with `H:MM` order by
/// clock time and come before free-form labels, which order lexically.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct TimeLabel(pub String);

impl TimeLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn minutes(&self) -> Option<u32> {
        let (h, rest) = self.0.trim_start().split_once(':')?;
        if h.is_empty() || h.len() > 2 || !h.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let m = rest.get(..2)?;
        if !m.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (h, m): (u32, u32) = (h.parse().ok()?, m.parse().ok()?);
        if h > 24 || m > 59 {
            return None;
        }
        Some(h * 60 + m)
    }

    fn sort_key(&self) -> (bool, u32, &str) {
        let minutes = self.minutes();
        (minutes.is_none(), minutes.unwrap_or(0), self.0.as_str())
    }
}

impl Ord for TimeLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for TimeLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Composite (day, time) key of a lesson slot. Orders by day, then time.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct SlotKey {
    pub day: DayOfWeek,
    pub time: TimeLabel,
}

impl SlotKey {
    pub fn new(day: DayOfWeek, time: impl Into<String>) -> Self {
        Self {
            day,
            time: TimeLabel::new(time),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.time)
    }
}

impl FromStr for SlotKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day, time) = s
            .split_once('-')
            .ok_or_else(|| ParseError::Slot(s.to_string()))?;
        if time.is_empty() {
            return Err(ParseError::Slot(s.to_string()));
        }
        Ok(SlotKey::new(day.parse()?, time))
    }
}

impl TryFrom<String> for SlotKey {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SlotKey> for String {
    fn from(k: SlotKey) -> Self {
        k.to_string()
    }
}

fn default_max_hours() -> u32 {
    6
}

fn default_hours_per_week() -> u32 {
    2
}

fn default_capacity() -> u32 {
    40
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, with = "wire::json_list")]
    pub subjects: Vec<String>,
    #[serde(default, with = "wire::slot_set")]
    pub unavailable_times: BTreeSet<SlotKey>,
    #[serde(default = "default_max_hours")]
    pub max_hours_per_day: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewTeacher {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, with = "wire::json_list")]
    pub subjects: Vec<String>,
    #[serde(default, with = "wire::json_list")]
    pub unavailable_times: BTreeSet<SlotKey>,
    #[serde(default = "default_max_hours")]
    pub max_hours_per_day: u32,
}

impl Default for NewTeacher {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: None,
            phone: None,
            subjects: Vec::new(),
            unavailable_times: BTreeSet::new(),
            max_hours_per_day: default_max_hours(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Subject {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
    #[serde(default = "default_hours_per_week")]
    pub hours_per_week: u32,
    pub teacher_id: TeacherId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(default, with = "wire::flag")]
    pub requires_lab: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    #[serde(default = "default_hours_per_week")]
    pub hours_per_week: u32,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
    #[serde(default, with = "wire::flag")]
    pub requires_lab: bool,
}

impl Default for NewSubject {
    fn default() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            hours_per_week: default_hours_per_week(),
            teacher_id: None,
            requires_lab: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    #[default]
    Lecture,
    Lab,
    Hall,
}

impl FromStr for RoomType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lecture" => Ok(RoomType::Lecture),
            "lab" => Ok(RoomType::Lab),
            "hall" => Ok(RoomType::Hall),
            _ => Err(ParseError::RoomType(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub room_number: String,
    #[serde(default)]
    pub building: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub room_type: RoomType,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewRoom {
    pub room_number: String,
    pub building: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub room_type: RoomType,
}

impl Default for NewRoom {
    fn default() -> Self {
        Self {
            room_number: String::new(),
            building: String::new(),
            capacity: default_capacity(),
            room_type: RoomType::Lecture,
        }
    }
}

/// One scheduled lesson. Names are denormalized copies for display.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub struct ScheduleEntry {
    pub slot: SlotKey,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub teacher_id: TeacherId,
    pub teacher_name: String,
    pub room_id: RoomId,
    pub room_number: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSummary {
    #[serde(alias = "schedule_id")]
    pub id: ScheduleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub fitness_score: f64,
    #[serde(default)]
    pub execution_time: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    #[serde(alias = "schedule_id")]
    pub id: ScheduleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub fitness_score: f64,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default, alias = "schedule")]
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn summary(&self) -> ScheduleSummary {
        ScheduleSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at.clone(),
            fitness_score: self.fitness_score,
            execution_time: self.execution_time,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ScheduleStatistics {
    #[serde(default)]
    pub total_schedules: u64,
    #[serde(default)]
    pub avg_fitness_score: Option<f64>,
    #[serde(default)]
    pub avg_execution_time: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationParameters {
    pub population_size: u32,
    pub mutation_rate: f64,
    pub max_generations: u32,
    pub elite_size: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            population_size: 100,
            mutation_rate: 0.01,
            max_generations: 1000,
            elite_size: 2,
        }
    }
}

/// The three input collections, always replaced together.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct EntitySet {
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub rooms: Vec<Room>,
}

impl EntitySet {
    pub fn can_generate(&self) -> bool {
        !self.teachers.is_empty() && !self.subjects.is_empty() && !self.rooms.is_empty()
    }

    pub fn teacher(&self, id: &TeacherId) -> Option<&Teacher> {
        self.teachers.iter().find(|t| &t.id == id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    #[serde(flatten)]
    pub entities: EntitySet,
    pub parameters: GenerationParameters,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// Path segment of the export endpoint.
    pub fn route(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "excel",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            _ => Err(ParseError::Format(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Teacher,
    Subject,
    Room,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Teacher, EntityKind::Subject, EntityKind::Room];

    /// Collection name, also the REST resource name.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Teacher => "teachers",
            EntityKind::Subject => "subjects",
            EntityKind::Room => "rooms",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for EntityKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teacher" | "teachers" => Ok(EntityKind::Teacher),
            "subject" | "subjects" => Ok(EntityKind::Subject),
            "room" | "rooms" => Ok(EntityKind::Room),
            _ => Err(ParseError::Kind(s.to_string())),
        }
    }
}
