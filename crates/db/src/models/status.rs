//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` database table.

use courseforge_core::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up the variant for a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Revision lifecycle status.
    ///
    /// `Open` is the only non-terminal state. Merged revisions must never be
    /// processed again; closed and locked ones are frozen.
    RevisionStatus {
        Open = 1,
        Closed = 2,
        Merged = 3,
        Locked = 4,
    }
}

impl RevisionStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Open
    }

    /// Fail with a conflict unless a revision in this status may move to
    /// `target`. Only `Open` has outgoing transitions.
    pub fn ensure_transition(self, target: RevisionStatus) -> Result<(), CoreError> {
        if self == target {
            return Err(CoreError::Conflict(format!(
                "Revision is already {}",
                self.label()
            )));
        }
        if self.is_terminal() || target == Self::Open {
            return Err(CoreError::Conflict(format!(
                "Revision is {} and cannot become {}",
                self.label(),
                target.label()
            )));
        }
        Ok(())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
            Self::Locked => "locked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for status in [
            RevisionStatus::Open,
            RevisionStatus::Closed,
            RevisionStatus::Merged,
            RevisionStatus::Locked,
        ] {
            assert_eq!(RevisionStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(RevisionStatus::from_id(9), None);
    }

    #[test]
    fn only_open_revisions_move() {
        assert!(RevisionStatus::Open.ensure_transition(RevisionStatus::Merged).is_ok());
        assert!(RevisionStatus::Open.ensure_transition(RevisionStatus::Locked).is_ok());

        let err = RevisionStatus::Merged
            .ensure_transition(RevisionStatus::Merged)
            .unwrap_err();
        assert_eq!(err.to_string(), "Conflict: Revision is already merged");

        assert!(RevisionStatus::Locked.ensure_transition(RevisionStatus::Merged).is_err());
        assert!(RevisionStatus::Closed.ensure_transition(RevisionStatus::Open).is_err());
    }
}
