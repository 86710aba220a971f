//! Bookable spaces and their canonical keys.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Canonical key of a space, e.g. `"-1st floor 12"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceKey(String);

impl SpaceKey {
    pub fn new(floor: i32, number: i32) -> Self {
        Self(format!("{} {}", floor_label(floor), number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SpaceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SpaceKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SpaceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordinal floor label: `1st floor`, `-2nd floor`, `0th floor`.
///
/// The suffix only looks at the absolute value, so 11 is `11th` and 21 is `21th`.
pub fn floor_label(floor: i32) -> String {
    let suffix = match floor.unsigned_abs() {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{floor}{suffix} floor")
}

/// A single bookable slot (parking stall or desk).
///
/// When `reserved` is false the other reservation fields are stale and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Space {
    pub number: i32,
    pub floor: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub reserved_by: String,
    #[serde(default)]
    pub reserved_by_id: String,
    #[serde(default)]
    pub reserved_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub auto_release: bool,
}

impl Space {
    pub fn new(floor: i32, number: i32) -> Self {
        Self {
            number,
            floor,
            description: String::new(),
            reserved: false,
            reserved_by: String::new(),
            reserved_by_id: String::new(),
            reserved_time: None,
            auto_release: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn key(&self) -> SpaceKey {
        SpaceKey::new(self.floor, self.number)
    }

    pub fn floor_label(&self) -> String {
        floor_label(self.floor)
    }

    /// True when the space is currently reserved by `user_id`.
    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.reserved && self.reserved_by_id == user_id
    }

    /// Stamp a reservation on the space.
    pub fn reserve(&mut self, user: &str, user_id: &str, at: NaiveDateTime, auto_release: bool) {
        self.reserved = true;
        self.reserved_by = user.to_string();
        self.reserved_by_id = user_id.to_string();
        self.reserved_time = Some(at);
        self.auto_release = auto_release;
    }

    /// Clear the reservation flags, leaving attribution behind.
    pub fn free(&mut self) {
        self.reserved = false;
        self.auto_release = false;
    }

    pub fn sort_key(&self) -> (i32, i32) {
        (self.floor, self.number)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_suffix_uses_absolute_value() {
        assert_eq!(floor_label(1), "1st floor");
        assert_eq!(floor_label(-1), "-1st floor");
        assert_eq!(floor_label(2), "2nd floor");
        assert_eq!(floor_label(-3), "-3rd floor");
        assert_eq!(floor_label(0), "0th floor");
        assert_eq!(floor_label(11), "11th floor");
    }

    #[test]
    fn key_combines_floor_and_number() {
        assert_eq!(Space::new(-1, 12).key().as_str(), "-1st floor 12");
        assert_eq!(SpaceKey::new(1, 10), SpaceKey::from("1st floor 10"));
    }

    #[test]
    fn free_keeps_attribution() {
        let at = chrono::NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut space = Space::new(1, 10);
        space.reserve("alice", "U1", at, true);
        assert!(space.is_held_by("U1"));

        space.free();
        assert!(!space.reserved);
        assert!(!space.auto_release);
        assert_eq!(space.reserved_by_id, "U1");
        assert!(!space.is_held_by("U1"));
    }
}
