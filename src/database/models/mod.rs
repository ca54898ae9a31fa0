/// A stored text value that is not one of the enum's allowed values
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} value '{value}'")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

/// Enums persisted as constrained TEXT columns. Generates `as_str`, `Display`,
/// `FromStr` and `TryFrom<String>` (used by `#[sqlx(try_from = "String")]`).
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::database::models::InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::database::models::InvalidEnumValue {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::database::models::InvalidEnumValue;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub(crate) use text_enum;

pub mod agent;
pub mod agent_break;
pub mod call;
pub mod company;
pub mod user;

pub use agent::{Agent, AgentStatus, LegacyAgent};
pub use agent_break::{AgentBreak, BreakStatus, BreakWithAgent};
pub use call::CallRecord;
pub use company::{Company, CompanyStatus, PaymentStatus};
pub use user::{LegacyUser, MasterUser, Role};


/// Wire format for timestamps: `YYYY-MM-DD HH:MM:SS`, naive local time.
/// Input also accepts the `T`-separated and minute-precision forms that
/// browser date pickers send, and RFC 3339 with an offset (offset dropped).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    const INPUT_FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        INPUT_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Empty strings deserialize as `None`
        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::timestamp;

    #[test]
    fn parses_browser_and_wire_formats() {
        let wire = timestamp::parse("2024-03-01 09:30:00").unwrap();
        assert_eq!(timestamp::parse("2024-03-01T09:30").unwrap(), wire);
        assert_eq!(timestamp::parse("2024-03-01T09:30:00").unwrap(), wire);
        assert_eq!(timestamp::parse("2024-03-01T09:30:00+05:30").unwrap(), wire);
        assert!(timestamp::parse("yesterday").is_none());
    }
}
