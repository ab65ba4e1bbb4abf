//! Well-known notification kinds.
//!
//! These must match the values stored in the `notification_outbox.kind`
//! column; the external messaging worker dispatches on them.

use serde::{Deserialize, Serialize};

/// What the messaging worker should send for a set of entity ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// Email to a requester acknowledging their request(s).
    RequestConfirmation,
    /// Email/SMS to a proxy presenting matched requests to accept or decline.
    ProxyMatchingOffer,
    /// SMS to requesters whose requests a proxy accepted.
    ProxyAcceptanceSms,
    /// SMS to both parties once a request is confirmed.
    RequestConfirmedSms,
    /// Email inviting a person to become a voting proxy.
    CandidateInvitationEmail,
    /// Ask the geocoding service to (re)locate a person.
    GeocodePerson,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::RequestConfirmation => "request-confirmation",
            NotificationKind::ProxyMatchingOffer => "proxy-matching-offer",
            NotificationKind::ProxyAcceptanceSms => "proxy-acceptance-sms",
            NotificationKind::RequestConfirmedSms => "request-confirmed-sms",
            NotificationKind::CandidateInvitationEmail => "candidate-invitation-email",
            NotificationKind::GeocodePerson => "geocode-person",
        }
    }

    /// Entity type the notification's ids refer to.
    pub fn entity_type(self) -> &'static str {
        match self {
            NotificationKind::RequestConfirmation
            | NotificationKind::ProxyAcceptanceSms
            | NotificationKind::RequestConfirmedSms => "voting_proxy_request",
            NotificationKind::ProxyMatchingOffer | NotificationKind::CandidateInvitationEmail => {
                "voting_proxy"
            }
            NotificationKind::GeocodePerson => "person",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
