//! Status enums mapping to the SMALLINT lookup tables, plus the transition
//! rules for proxies and requests.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($entity:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Entity name used in error messages.
            pub const ENTITY: &'static str = $entity;

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lower-case name as stored in the lookup table.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Resolve a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(id: StatusId) -> Result<Self, Self::Error> {
                $name::from_id(id).ok_or_else(|| {
                    CoreError::Internal(format!("Unknown {} status id {id}", $entity))
                })
            }
        }
    };
}

define_status_enum! {
    /// Voting proxy (volunteer) lifecycle status.
    ProxyStatus ("voting proxy") {
        /// Recruited by outreach, registration not completed yet.
        Invited = 1 => "invited",
        Created = 2 => "created",
        Available = 3 => "available",
        Unavailable = 4 => "unavailable",
    }
}

define_status_enum! {
    /// Voting proxy request lifecycle status.
    RequestStatus ("voting proxy request") {
        Created = 1 => "created",
        Accepted = 2 => "accepted",
        Confirmed = 3 => "confirmed",
        /// Handed to a campaign manager, out of automatic matching for good.
        Forwarded = 4 => "forwarded",
    }
}

impl ProxyStatus {
    /// Statuses eligible for a matching pass.
    pub const MATCHABLE: [ProxyStatus; 2] = [ProxyStatus::Created, ProxyStatus::Available];

    /// Whether the proxy may take part in a matching pass.
    pub fn is_matchable(self) -> bool {
        Self::MATCHABLE.contains(&self)
    }

    /// Statuses reachable from `self`.
    pub fn valid_transitions(self) -> &'static [ProxyStatus] {
        match self {
            ProxyStatus::Invited => &[ProxyStatus::Created],
            ProxyStatus::Created => &[ProxyStatus::Available, ProxyStatus::Unavailable],
            ProxyStatus::Available => &[ProxyStatus::Available, ProxyStatus::Unavailable],
            // Re-registering keeps a declined volunteer unavailable.
            ProxyStatus::Unavailable => &[],
        }
    }

    pub fn can_transition(self, to: ProxyStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning [`CoreError::InvalidTransition`] otherwise.
    pub fn validate_transition(self, to: ProxyStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.name(),
                to: to.name(),
            })
        }
    }
}

impl RequestStatus {
    /// Statuses reachable from `self`. Confirmed and Forwarded are terminal.
    pub fn valid_transitions(self) -> &'static [RequestStatus] {
        match self {
            RequestStatus::Created => &[RequestStatus::Accepted, RequestStatus::Forwarded],
            RequestStatus::Accepted => &[RequestStatus::Confirmed],
            RequestStatus::Confirmed | RequestStatus::Forwarded => &[],
        }
    }

    pub fn can_transition(self, to: RequestStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn validate_transition(self, to: RequestStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.name(),
                to: to.name(),
            })
        }
    }
}
