use serde::{Deserialize, Serialize};

use crate::{ParseError, RoomId, ScheduleEntry, SlotKey, SubjectId, TeacherId, TimeLabel};

/// Schedule entry as the optimizer emits it. The slot is given either as
/// separate `day`/`time` fields or as the composite `timeslot` text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub timeslot: Option<String>,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub subject_name: String,
    pub teacher_id: TeacherId,
    #[serde(default)]
    pub teacher_name: String,
    pub room_id: RoomId,
    #[serde(default)]
    pub room_number: String,
}

impl TryFrom<RawEntry> for ScheduleEntry {
    type Error = ParseError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let slot = match (&raw.day, &raw.time, &raw.timeslot) {
            (Some(day), Some(time), _) if !time.is_empty() => SlotKey {
                day: day.parse()?,
                time: TimeLabel::new(time.as_str()),
            },
            (_, _, Some(ts)) => ts.parse()?,
            _ => {
                return Err(ParseError::Entry(format!(
                    "subject {} / teacher {}",
                    raw.subject_id, raw.teacher_id
                )))
            }
        };
        Ok(ScheduleEntry {
            slot,
            subject_id: raw.subject_id,
            subject_name: raw.subject_name,
            teacher_id: raw.teacher_id,
            teacher_name: raw.teacher_name,
            room_id: raw.room_id,
            room_number: raw.room_number,
        })
    }
}

impl From<ScheduleEntry> for RawEntry {
    fn from(e: ScheduleEntry) -> Self {
        RawEntry {
            day: Some(e.slot.day.to_string()),
            time: Some(e.slot.time.0.clone()),
            timeslot: Some(e.slot.to_string()),
            subject_id: e.subject_id,
            subject_name: e.subject_name,
            teacher_id: e.teacher_id,
            teacher_name: e.teacher_name,
            room_id: e.room_id,
            room_number: e.room_number,
        }
    }
}

/// Lists the backend keeps as JSON text columns. Reads either form, writes text.
pub(crate) mod json_list {
    use serde::de::{DeserializeOwned, Error as _};
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<T: Serialize, S: Serializer>(v: &T, s: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(v).map_err(S::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: DeserializeOwned + Default,
        D: Deserializer<'de>,
    {
        match Value::deserialize(d)? {
            Value::Null => Ok(T::default()),
            Value::String(s) if s.trim().is_empty() => Ok(T::default()),
            Value::String(s) => serde_json::from_str(&s).map_err(D::Error::custom),
            other => serde_json::from_value(other).map_err(D::Error::custom),
        }
    }
}

/// Teacher unavailability as stored by the backend. The column is free text,
/// so slots that do not name a teaching day are dropped with a warning
/// instead of failing the whole record.
pub(crate) mod slot_set {
    use std::collections::BTreeSet;

    use serde::{Deserializer, Serializer};
    use tracing::warn;

    use crate::SlotKey;

    pub fn serialize<S: Serializer>(v: &BTreeSet<SlotKey>, s: S) -> Result<S::Ok, S::Error> {
        super::json_list::serialize(v, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<SlotKey>, D::Error> {
        let raw: Vec<String> = super::json_list::deserialize(d)?;
        Ok(raw
            .into_iter()
            .filter_map(|text| match text.parse::<SlotKey>() {
                Ok(slot) => Some(slot),
                Err(e) => {
                    warn!(slot = %text, error = %e, "ignoring unavailable time");
                    None
                }
            })
            .collect())
    }
}

/// Boolean columns stored as 0/1.
pub(crate) mod flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|x| x != 0.0)),
            Value::String(s) => match s.trim() {
                "1" | "true" => Ok(true),
                "" | "0" | "false" => Ok(false),
                other => Err(D::Error::custom(format!("not a flag: {other}"))),
            },
            other => Err(D::Error::custom(format!("not a flag: {other}"))),
        }
    }
}
