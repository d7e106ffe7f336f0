//!
//! # Enum-String Mapping Module
//!
//! Defines the [enumstr] macro and its paired [EnumStr] trait,
//! mapping a fieldless enum onto the keyword strings of a text format.
//! Specctra DSN exposes most enumerated values as bare keywords, e.g. `(side front)` or `(type signal)`.
//!
//! Example:
//!
//! ```
//! use dsn21utils::{enumstr, EnumStr};
//! use schemars::JsonSchema;
//! use serde::{Deserialize, Serialize};
//!
//! enumstr!(
//!     /// # Board Sides
//!     Side {
//!         Front: "front",
//!         Back: "back",
//!     }
//! );
//! assert_eq!(Side::parse("FRONT"), Some(Side::Front));
//! assert_eq!(Side::Back.to_str(), "back");
//! ```
//!

///
/// # String-Enumeration Trait
///
/// * `to_str` converts the enum to its keyword.
/// * `from_str` matches a keyword exactly.
/// * `parse` matches a keyword without regard to ASCII case.
///
pub trait EnumStr: std::marker::Sized + Copy + 'static {
    /// All variants, in declaration order
    fn variants() -> &'static [Self];
    fn to_str(&self) -> &'static str;
    /// Case-sensitive keyword lookup
    fn from_str(txt: &str) -> Option<Self> {
        Self::variants().iter().copied().find(|v| v.to_str() == txt)
    }
    /// Case-insensitive keyword lookup.
    /// DSN readers are expected to accept keywords in any case.
    fn parse(txt: &str) -> Option<Self> {
        Self::variants()
            .iter()
            .copied()
            .find(|v| v.to_str().eq_ignore_ascii_case(txt))
    }
}

///
/// # Enum-String Pairing Macro
///
/// Creates an `enum` whose fieldless variants are paired with string values, which:
/// * Implements [EnumStr] for conversions to and from those strings
/// * Implements [std::fmt::Display], writing the string values
/// * Derives `serde` and `schemars` support, so callers must have
///   `Serialize`, `Deserialize`, `JsonSchema` and `EnumStr` in scope.
///
#[macro_export]
macro_rules! enumstr {
    (   $(#[$meta: meta])*
        $enum_name: ident {
        $( $variant: ident : $strval: literal ),* $(,)?
    }) => {
        $(#[$meta])*
        #[allow(dead_code)]
        #[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $( #[doc=$strval]
                $variant ),*
        }
        impl EnumStr for $enum_name {
            fn variants() -> &'static [Self] {
                &[ $( Self::$variant ),* ]
            }
            /// Convert a [$enum_name] variant to its paired (static) string value.
            fn to_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $strval),*,
                }
            }
        }
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                f.write_str(self.to_str())
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    enumstr!(
        /// # Copper Pour Modes
        Pour {
            Solid: "solid",
            Hatched: "hatched",
            PartNumber: "PN",
        }
    );

    #[test]
    fn test_enumstr() {
        assert_eq!(Pour::Solid.to_str(), "solid");
        assert_eq!(Pour::Hatched.to_string(), "hatched");

        assert_eq!(Pour::from_str("solid"), Some(Pour::Solid));
        assert_eq!(Pour::from_str("SOLID"), None);
        assert_eq!(Pour::from_str("none"), None);
    }
    #[test]
    fn test_enumstr_nocase() {
        assert_eq!(Pour::parse("HATCHED"), Some(Pour::Hatched));
        assert_eq!(Pour::parse("pn"), Some(Pour::PartNumber));
        assert_eq!(Pour::variants().len(), 3);
    }
}
