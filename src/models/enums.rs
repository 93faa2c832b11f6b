use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Severity {
    Warning => "warning",
    Critical => "critical",
});

str_enum!(AlertState {
    Open => "open",
    Escalated => "escalated",
    Reviewed => "reviewed",
    Closed => "closed",
});

str_enum!(Role {
    Nurse => "nurse",
    Doctor => "doctor",
});

str_enum!(RuleId {
    LowSpo2 => "low_spo2",
    HighTemp => "high_temp",
    HighHeartRate => "high_heart_rate",
});

str_enum!(VitalKind {
    HeartRate => "heart_rate",
    Temperature => "temperature",
    Spo2 => "spo2",
});

impl AlertState {
    /// Whether an alert in this state still blocks a new alert for the
    /// same (patient, rule) pair.
    pub fn is_active(&self) -> bool {
        matches!(self, AlertState::Open | AlertState::Escalated)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertState::Closed)
    }
}
