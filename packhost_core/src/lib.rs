use serde::{Deserialize, Serialize};

pub mod api;
pub mod metadata;

pub trait StrConversion {
    fn from_str(value: &str) -> Self;
    fn as_str(&self) -> &'static str;
}

/// Which descriptor file an archive was recognised by.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum PackFormat {
    Modrinth,
    CurseForge,
    Unknown,
}

impl std::fmt::Display for PackFormat {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}
impl StrConversion for PackFormat {
    fn from_str(value: &str) -> Self {
        match value {
            "Modrinth" => Self::Modrinth,
            "CurseForge" => Self::CurseForge,
            _ => Self::Unknown,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Modrinth => "Modrinth",
            Self::CurseForge => "CurseForge",
            Self::Unknown => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_format_string_conversion() {
        for format in [PackFormat::Modrinth, PackFormat::CurseForge, PackFormat::Unknown] {
            assert_eq!(PackFormat::from_str(format.as_str()), format);
        }
        assert_eq!(PackFormat::from_str("Technic"), PackFormat::Unknown);
        assert_eq!(PackFormat::CurseForge.to_string(), "CurseForge");
    }
}
