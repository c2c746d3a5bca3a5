use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
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

str_enum!(SourceMethod {
    Manual => "manual",
    PastedText => "pasted_text",
    Tabular => "tabular",
    FileUpload => "file_upload",
    TemplateOcr => "template_ocr",
    GenericOcr => "generic_ocr",
    Voice => "voice",
    Api => "api",
});

str_enum!(Grain {
    None => "none",
    AlongLength => "along_l",
    AlongWidth => "along_w",
});

// Two long edges (L1, L2) and two short edges (W1, W2).
str_enum!(EdgeId {
    L1 => "L1",
    L2 => "L2",
    W1 => "W1",
    W2 => "W2",
});

impl Default for Grain {
    fn default() -> Self {
        Self::None
    }
}

impl Grain {
    /// An explicit grain direction pins the part's orientation.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl EdgeId {
    /// Canonical order used whenever an edge list is emitted.
    pub const ALL: [EdgeId; 4] = [EdgeId::L1, EdgeId::L2, EdgeId::W1, EdgeId::W2];
}
