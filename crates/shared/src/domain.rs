use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(MemberId);
id_newtype!(SocietyId);
id_newtype!(AmenityId);
id_newtype!(PaymentId);
id_newtype!(NoticeId);
id_newtype!(ComplaintId);

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` over a fixed set of
/// snake_case wire names, so the database and JSON agree on spelling.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase();
                match normalized.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Secretary,
    Owner,
    Tenant,
    Member,
}

wire_enum!(Role, "role", {
    Secretary => "secretary",
    Owner => "owner",
    Tenant => "tenant",
    Member => "member",
});

impl Role {
    /// Secretaries are created as active residents; every other role waits
    /// for admission.
    pub fn registers_directly(self) -> bool {
        matches!(self, Role::Secretary)
    }
}

/// Lifecycle of a member row. `Pending` rows are applicants, `Active` rows
/// are residents, `Rejected` rows are kept for audit only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Active,
    Rejected,
}

wire_enum!(MemberStatus, "member status", {
    Pending => "pending",
    Active => "active",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingVerification,
    Success,
    Failed,
}

wire_enum!(PaymentStatus, "payment status", {
    PendingVerification => "pending_verification",
    Success => "success",
    Failed => "failed",
});

impl PaymentStatus {
    /// Active payments block a second initiation for the same billing period.
    pub fn is_active(self) -> bool {
        matches!(self, PaymentStatus::PendingVerification | PaymentStatus::Success)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

wire_enum!(BillingCycle, "billing cycle", {
    Monthly => "monthly",
    Quarterly => "quarterly",
    HalfYearly => "half_yearly",
    Yearly => "yearly",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
}

wire_enum!(ComplaintStatus, "complaint status", {
    Pending => "pending",
    InProgress => "in_progress",
    Resolved => "resolved",
});
