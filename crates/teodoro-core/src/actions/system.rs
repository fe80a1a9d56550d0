//! Power actions.

use crate::lexicon::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Suspend,
    Restart,
}

impl PowerAction {
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Shutdown => Some(PowerAction::Shutdown),
            Intent::Suspend => Some(PowerAction::Suspend),
            Intent::Restart => Some(PowerAction::Restart),
            _ => None,
        }
    }

    pub fn speech(self) -> &'static str {
        match self {
            PowerAction::Shutdown => "Perfecto, que tengas un buen día",
            PowerAction::Suspend => "Perfecto, suspendiendo el equipo",
            PowerAction::Restart => "Perfecto, reiniciando el equipo",
        }
    }

    /// `systemctl` verb of the action.
    pub fn systemctl_verb(self) -> &'static str {
        match self {
            PowerAction::Shutdown => "poweroff",
            PowerAction::Suspend => "suspend",
            PowerAction::Restart => "reboot",
        }
    }

    /// The machine goes away, so phone integration must be switched off first.
    pub fn ends_session(self) -> bool {
        matches!(self, PowerAction::Shutdown | PowerAction::Restart)
    }
}
