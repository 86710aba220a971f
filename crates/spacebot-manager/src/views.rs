//! Modal rendering for the booking, release and admin flows.

use crate::profile::Profile;
use spacebot_core::{Block, ButtonStyle, Element, Modal, SelectOption};
use spacebot_lot::{ReleaseInfo, ReleaseRef, Space, SpaceFilter, SpaceKey, SpacesLot, UserRoster, DATE_FORMAT};

/// Action and block ids shared by rendering and event handling.
pub mod ids {
    pub const FLOOR_OPTION: &str = "floorOption";
    pub const SHOW_OPTION: &str = "showOption";
    pub const RESERVE_SPACE: &str = "reserveSpace";
    pub const RELEASE_SPACE: &str = "releaseSpace";
    pub const TEMP_RELEASE_SPACE: &str = "tempReleaseSpace";
    pub const CANCEL_TEMP_RELEASE: &str = "cancelTempReleaseSpace";
    pub const RELEASE_START_DATE: &str = "releaseStartDate";
    pub const RELEASE_END_DATE: &str = "releaseEndDate";
    pub const REMOVE_SPACE: &str = "removeSpace";
    pub const TOGGLE_PARKING: &str = "toggleParking";
    pub const TOGGLE_ADMIN: &str = "toggleAdmin";
    pub const SPACE_FLOOR: &str = "spaceFloor";
    pub const SPACE_NUMBER: &str = "spaceNumber";
    pub const SPACE_DESCRIPTION: &str = "spaceDescription";

    pub const SHOW_FREE: &str = "free";
    pub const SHOW_TAKEN: &str = "taken";
}

/// Per-user listing choices of the booking modal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub floor: Option<String>,
    pub show_taken: bool,
}

impl Listing {
    pub fn filter(&self) -> SpaceFilter {
        if self.show_taken {
            SpaceFilter::Taken
        } else {
            SpaceFilter::Free
        }
    }
}

/// Button value naming one release, `"<space key>#<id>"`.
pub fn release_value(info: &ReleaseInfo) -> String {
    format!("{}#{}", info.space_key(), info.unique_id)
}

pub fn parse_release_value(value: &str) -> Option<ReleaseRef> {
    let (key, id) = value.rsplit_once('#')?;
    Some(ReleaseRef {
        key: SpaceKey::from(key),
        id: id.parse().ok()?,
    })
}

fn hhmm(space: &Space) -> String {
    space
        .reserved_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn status_line(space: &Space, user_id: &str) -> String {
    match (space.reserved, space.is_held_by(user_id)) {
        (false, _) => format!("{space}\nFree"),
        (true, true) if !space.auto_release => format!("{space}\nYour permanent space"),
        (true, true) => format!("{space}\nReserved by you at {}", hhmm(space)),
        (true, false) => format!("{space}\nReserved by {} at {}", space.reserved_by, hhmm(space)),
    }
}

/// The main booking modal for `user_id`.
///
/// Own spaces come first whatever the floor, then the spaces of the selected
/// floor that match the free/taken toggle, then the user's scheduled releases.
pub fn booking_modal(
    profile: &Profile,
    lot: &SpacesLot,
    user_id: &str,
    is_admin: bool,
    listing: &Listing,
) -> Modal {
    let floors = lot.all_floors();
    let floor = listing
        .floor
        .clone()
        .filter(|f| floors.contains(f))
        .or_else(|| lot.owned_space_by_user_id(user_id).map(Space::floor_label))
        .or_else(|| floors.first().cloned())
        .unwrap_or_default();

    let mut modal = Modal::new(profile.booking_title)
        .block(Block::header(profile.booking_title))
        .block(Block::context(format!(
            "Reservations are cleared every day at {}.",
            profile.cutoff
        )));

    if floors.is_empty() {
        return modal.block(Block::section(format!("There are no {}s yet.", profile.noun)));
    }

    let floor_options: Vec<SelectOption> = floors
        .iter()
        .map(|f| SelectOption::new(f.clone(), f.clone()))
        .collect();
    let show_free = SelectOption::new("Free", ids::SHOW_FREE);
    let show_taken = SelectOption::new("Taken", ids::SHOW_TAKEN);
    modal = modal.block(Block::Actions {
        block_id: "listing".into(),
        elements: vec![
            Element::StaticSelect {
                action_id: ids::FLOOR_OPTION.into(),
                placeholder: "Floor".into(),
                options: floor_options,
                initial_option: Some(SelectOption::new(floor.clone(), floor.clone())),
            },
            Element::StaticSelect {
                action_id: ids::SHOW_OPTION.into(),
                placeholder: "Show".into(),
                initial_option: Some(if listing.show_taken {
                    show_taken.clone()
                } else {
                    show_free.clone()
                }),
                options: vec![show_free, show_taken],
            },
        ],
    });
    modal = modal.block(Block::Divider);

    for space in lot.spaces_by_floor(user_id, &floor, listing.filter()) {
        modal = modal.blocks(space_blocks(space, user_id, is_admin));
    }

    let releases: Vec<&ReleaseInfo> = lot
        .to_be_released
        .releases()
        .filter(|r| r.submitted && (r.owner_id == user_id || is_admin))
        .collect();
    if !releases.is_empty() {
        modal = modal
            .block(Block::Divider)
            .block(Block::section("Scheduled releases"));
        for info in releases {
            let state = if info.cancelled {
                "cancelled"
            } else if info.active {
                "active"
            } else {
                "scheduled"
            };
            modal = modal.block(Block::section_with(
                format!("{}: {} ({state})", info.space_key(), info.date_range()),
                Element::button(ids::CANCEL_TEMP_RELEASE, "Cancel", release_value(info))
                    .styled(ButtonStyle::Danger),
            ));
        }
    }
    modal
}

fn space_blocks(space: &Space, user_id: &str, is_admin: bool) -> Vec<Block> {
    let key = space.key().to_string();
    let text = status_line(space, user_id);

    if !space.reserved {
        return vec![Block::section_with(
            text,
            Element::button(ids::RESERVE_SPACE, "Reserve", key).styled(ButtonStyle::Primary),
        )];
    }

    let permanent = !space.auto_release;
    let held = space.is_held_by(user_id);
    let mut elements = Vec::new();
    if held || is_admin {
        elements.push(Element::button(ids::RELEASE_SPACE, "Release", key.clone()));
    }
    if permanent && (held || is_admin) {
        elements.push(Element::button(
            ids::TEMP_RELEASE_SPACE,
            "Release temporarily",
            key.clone(),
        ));
    }

    let mut blocks = vec![Block::section(text)];
    if !elements.is_empty() {
        blocks.push(Block::Actions {
            block_id: format!("space:{key}"),
            elements,
        });
    }
    blocks
}

/// The release modal pushed on top of the booking modal.
pub fn release_modal(profile: &Profile, info: &ReleaseInfo) -> Modal {
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format(DATE_FORMAT).to_string());
    Modal::new(profile.release_title)
        .submit("Release")
        .close("Cancel")
        .block(Block::section(format!(
            "Release {} of {} for a range of days. Both dates are included.",
            info.space_key(),
            info.owner_name
        )))
        .block(Block::Input {
            block_id: "releaseStart".into(),
            label: "First free day".into(),
            element: Element::DatePicker {
                action_id: ids::RELEASE_START_DATE.into(),
                initial_date: date(info.start_date),
            },
            optional: false,
        })
        .block(Block::Input {
            block_id: "releaseEnd".into(),
            label: "Last free day".into(),
            element: Element::DatePicker {
                action_id: ids::RELEASE_END_DATE.into(),
                initial_date: date(info.end_date),
            },
            optional: false,
        })
        .block(Block::context(format!(
            "The {} is handed over at {} the day before the first free day.",
            profile.noun, profile.cutoff
        )))
}

/// Admin modal listing every space with a remove button, plus the add form.
pub fn spaces_admin_modal(profile: &Profile, lot: &SpacesLot) -> Modal {
    let mut modal = Modal::new(profile.admin_title)
        .submit("Add")
        .block(Block::header(profile.admin_title));

    let mut spaces: Vec<&Space> = lot.spaces().collect();
    spaces.sort_by_key(|s| s.sort_key());
    for space in spaces {
        let releases = lot.to_be_released.get(space.key().as_str()).map_or(0, |p| p.len());
        let text = match releases {
            0 => space.to_string(),
            n => format!("{space}\n{n} scheduled release(s)"),
        };
        modal = modal.block(Block::section_with(
            text,
            Element::button(ids::REMOVE_SPACE, "Remove", space.key().to_string())
                .styled(ButtonStyle::Danger),
        ));
    }

    modal
        .block(Block::Divider)
        .block(Block::Input {
            block_id: "newSpaceFloor".into(),
            label: "Floor".into(),
            element: Element::PlainTextInput {
                action_id: ids::SPACE_FLOOR.into(),
                multiline: false,
            },
            optional: false,
        })
        .block(Block::Input {
            block_id: "newSpaceNumber".into(),
            label: "Number".into(),
            element: Element::PlainTextInput {
                action_id: ids::SPACE_NUMBER.into(),
                multiline: false,
            },
            optional: false,
        })
        .block(Block::Input {
            block_id: "newSpaceDescription".into(),
            label: "Description".into(),
            element: Element::PlainTextInput {
                action_id: ids::SPACE_DESCRIPTION.into(),
                multiline: false,
            },
            optional: true,
        })
}

/// Admin modal listing the roster with permission toggles.
pub fn users_modal(title: &str, roster: &UserRoster) -> Modal {
    let mut modal = Modal::new(title).block(Block::header(title));
    for (name, user) in roster.iter() {
        let parking = if user.has_permanent_parking {
            "Revoke parking"
        } else {
            "Grant parking"
        };
        let admin = if user.is_admin() {
            "Revoke admin"
        } else {
            "Grant admin"
        };
        modal = modal
            .block(Block::section(format!(
                "{name} ({}){}{}",
                user.id,
                if user.has_permanent_parking { ", permanent parking" } else { "" },
                if user.is_admin() { ", admin" } else { "" },
            )))
            .block(Block::Actions {
                block_id: format!("user:{}", user.id),
                elements: vec![
                    Element::button(ids::TOGGLE_PARKING, parking, user.id.clone()),
                    Element::button(ids::TOGGLE_ADMIN, admin, user.id.clone()),
                ],
            });
    }
    modal
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacebot_lot::{Cutoff, Rights, User};

    fn lot(dir: &tempfile::TempDir) -> SpacesLot {
        let mut lot = SpacesLot::new(dir.path().join("parking.json"));
        let mut owned = Space::new(1, 10);
        let at = chrono::NaiveDate::from_ymd_opt(2025, 2, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        owned.reserve("alice", "U1", at, false);
        lot.add_space(owned).unwrap();
        lot.add_space(Space::new(1, 11)).unwrap();
        lot.add_space(Space::new(2, 1)).unwrap();
        lot
    }

    fn action_ids(modal: &Modal) -> Vec<String> {
        modal.elements().map(|e| e.action_id().to_string()).collect()
    }

    #[test]
    fn owner_sees_release_buttons() {
        let dir = tempfile::tempdir().unwrap();
        let lot = lot(&dir);
        let profile = Profile::parking(Cutoff::default());
        let modal = booking_modal(&profile, &lot, "U1", false, &Listing::default());

        assert_eq!(modal.title, "Parking");
        assert!(modal.text().contains("Your permanent space"));
        assert_eq!(
            action_ids(&modal),
            vec![
                ids::FLOOR_OPTION,
                ids::SHOW_OPTION,
                ids::RELEASE_SPACE,
                ids::TEMP_RELEASE_SPACE,
                ids::RESERVE_SPACE,
            ]
        );
    }

    #[test]
    fn stranger_sees_taken_space_without_buttons() {
        let dir = tempfile::tempdir().unwrap();
        let lot = lot(&dir);
        let profile = Profile::parking(Cutoff::default());
        let listing = Listing {
            floor: Some("1st floor".into()),
            show_taken: true,
        };
        let modal = booking_modal(&profile, &lot, "U3", false, &listing);
        assert!(modal.text().contains("Reserved by alice at 09:00"));
        assert_eq!(action_ids(&modal), vec![ids::FLOOR_OPTION, ids::SHOW_OPTION]);

        let admin = booking_modal(&profile, &lot, "U0", true, &listing);
        assert!(action_ids(&admin).contains(&ids::RELEASE_SPACE.to_string()));
    }

    #[test]
    fn unknown_floor_falls_back_to_first() {
        let dir = tempfile::tempdir().unwrap();
        let lot = lot(&dir);
        let profile = Profile::parking(Cutoff::default());
        let listing = Listing {
            floor: Some("9th floor".into()),
            show_taken: false,
        };
        let modal = booking_modal(&profile, &lot, "U3", false, &listing);
        assert!(modal.text().contains("1st floor 11"));
        assert!(!modal.text().contains("2nd floor 1"));
    }

    #[test]
    fn release_values_round_trip() {
        let parsed = parse_release_value("-1st floor 12#3").unwrap();
        assert_eq!(parsed.key.as_str(), "-1st floor 12");
        assert_eq!(parsed.id, 3);
        assert!(parse_release_value("1st floor 10").is_none());
        assert!(parse_release_value("1st floor 10#x").is_none());
    }

    #[test]
    fn users_modal_lists_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let mut roster = UserRoster::new(dir.path().join("users.json"));
        let mut alice = User::new("U1", Rights::Admin);
        alice.has_permanent_parking = true;
        roster.insert_user("alice", alice).unwrap();

        let modal = users_modal("Parking users", &roster);
        assert!(modal.text().contains("alice (U1), permanent parking, admin"));
        assert_eq!(
            action_ids(&modal),
            vec![ids::TOGGLE_PARKING, ids::TOGGLE_ADMIN]
        );
    }
}
