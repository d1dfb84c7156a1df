//! Persisted records. Every tenant-owned row carries `company_id`.
//!
//! Enumerated fields are stored as TEXT and surfaced as plain strings on the
//! row types; the typed enums below are used to validate request payloads.

/// Declares a snake_case string enum with `as_str`, `FromStr` and `Display`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{other}' is not a valid {}",
                        stringify!($name)
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

pub mod allocation;
pub mod audit;
pub mod client;
pub mod company;
pub mod employee;
pub mod invitation;
pub mod project;
pub mod resource;
pub mod skill;
pub mod user;

#[cfg(test)]
mod tests {
    use super::project::ProjectStatus;

    #[test]
    fn test_text_enum_round_trips_through_str() {
        for status in ProjectStatus::ALL {
            let parsed: ProjectStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
    }

    #[test]
    fn test_text_enum_serde_matches_as_str() {
        let json = serde_json::to_string(&ProjectStatus::OnHold).unwrap();
        assert_eq!(json, "\"on_hold\"");
    }

    #[test]
    fn test_text_enum_rejects_unknown() {
        let err = "paused".parse::<ProjectStatus>().unwrap_err();
        assert!(err.contains("ProjectStatus"));
    }
}
