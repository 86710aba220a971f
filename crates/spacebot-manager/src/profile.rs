use spacebot_lot::Cutoff;

/// A slash command and the alias answered instead in testing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub normal: &'static str,
    pub testing: &'static str,
}

impl Command {
    pub const fn new(normal: &'static str, testing: &'static str) -> Self {
        Self { normal, testing }
    }

    pub fn matches(&self, command: &str, testing: bool) -> bool {
        let expected = if testing { self.testing } else { self.normal };
        command.trim() == expected
    }
}

pub const ROLL: Command = Command::new("/roll", "/test-roll");

/// Everything that differs between the parking and the workspaces manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: &'static str,
    pub noun: &'static str,
    pub booking_title: &'static str,
    pub release_title: &'static str,
    pub admin_title: &'static str,
    pub booking: Command,
    pub admin: Command,
    pub users: Option<Command>,
    pub users_title: &'static str,
    pub reset_label: &'static str,
    pub cutoff: Cutoff,
}

impl Profile {
    pub fn parking(cutoff: Cutoff) -> Self {
        Self {
            name: "parking",
            noun: "parking space",
            booking_title: "Parking",
            release_title: "Release parking",
            admin_title: "Parking spaces",
            booking: Command::new("/parking", "/test-parking"),
            admin: Command::new("/spaces-parking", "/test-spaces-parking"),
            users: Some(Command::new("/users-parking", "/test-users-parking")),
            users_title: "Parking users",
            reset_label: "Reset parking status",
            cutoff,
        }
    }

    pub fn workspaces(cutoff: Cutoff) -> Self {
        Self {
            name: "workspaces",
            noun: "workspace",
            booking_title: "Workspaces",
            release_title: "Release workspace",
            admin_title: "Workspace spaces",
            booking: Command::new("/workspace", "/test-workspace"),
            admin: Command::new("/spaces-workspace", "/test-spaces-workspace"),
            users: None,
            users_title: "",
            reset_label: "Reset workspaces status",
            cutoff,
        }
    }

    /// True when a view with this title belongs to this manager.
    pub fn owns_view(&self, title: &str) -> bool {
        title == self.booking_title
            || title == self.release_title
            || title == self.admin_title
            || (self.users.is_some() && title == self.users_title)
    }

    pub fn handles_command(&self, command: &str, testing: bool) -> bool {
        self.booking.matches(command, testing)
            || self.admin.matches(command, testing)
            || self.users.is_some_and(|users| users.matches(command, testing))
    }
}
