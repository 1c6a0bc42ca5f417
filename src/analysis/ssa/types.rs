//! Type annotations carried by definitions and casts.
//!
//! The propagation core does not infer types. It only reads the type recorded
//! on a definition: to refuse propagating array-typed definitions, to size
//! memory accesses for alias checks, and to decide where signedness casts are
//! needed. Everything here is plain data.

use std::fmt;

/// Signedness of an integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signedness {
    /// Known signed.
    Signed,
    /// Known unsigned.
    Unsigned,
    /// Not yet determined.
    #[default]
    Unknown,
}

/// A machine-level type attached to a definition, a cast or a local.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Type {
    /// No value.
    Void,
    /// A single truth value.
    Boolean,
    /// An integer of the given width.
    Integer {
        /// Width in bits
        bits: u16,
        /// Signedness, possibly unknown
        sign: Signedness,
    },
    /// An IEEE float of the given width.
    Float {
        /// Width in bits
        bits: u16,
    },
    /// A pointer to another type.
    Pointer(Box<Type>),
    /// An array of `base` elements.
    Array {
        /// Element type
        base: Box<Type>,
        /// Number of elements, if known
        length: Option<u64>,
    },
    /// A named (user or library) type.
    Named(String),
    /// Only the width is known.
    Size(u16),
    /// Nothing is known.
    #[default]
    Unknown,
}

impl Type {
    /// Width used when nothing better is known.
    pub const STD_SIZE: u16 = 32;

    /// Creates a signed integer type.
    #[must_use]
    pub const fn signed(bits: u16) -> Self {
        Type::Integer {
            bits,
            sign: Signedness::Signed,
        }
    }

    /// Creates an unsigned integer type.
    #[must_use]
    pub const fn unsigned(bits: u16) -> Self {
        Type::Integer {
            bits,
            sign: Signedness::Unsigned,
        }
    }

    /// Creates a pointer to `self`.
    #[must_use]
    pub fn pointer_to(self) -> Self {
        Type::Pointer(Box::new(self))
    }

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    /// Returns `true` for integer types.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    /// Returns `true` when nothing is known about the type.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Returns the signedness of an integer type, `None` for anything else.
    #[must_use]
    pub fn signedness(&self) -> Option<Signedness> {
        match self {
            Type::Integer { sign, .. } => Some(*sign),
            _ => None,
        }
    }

    /// Returns the width in bits, if it is known.
    #[must_use]
    pub fn size_bits(&self) -> Option<u16> {
        match self {
            Type::Boolean => Some(1),
            Type::Integer { bits, .. } | Type::Float { bits } | Type::Size(bits) => Some(*bits),
            Type::Pointer(_) => Some(Self::STD_SIZE),
            Type::Array { base, length } => {
                let elem = base.size_bits()?;
                let count = u16::try_from((*length)?).ok()?;
                elem.checked_mul(count)
            }
            Type::Void | Type::Named(_) | Type::Unknown => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Boolean => write!(f, "bool"),
            Type::Integer { bits, sign } => match sign {
                Signedness::Signed => write!(f, "int{}", bits),
                Signedness::Unsigned => write!(f, "uint{}", bits),
                Signedness::Unknown => write!(f, "i{}", bits),
            },
            Type::Float { bits } => write!(f, "float{}", bits),
            Type::Pointer(inner) => write!(f, "{}*", inner),
            Type::Array { base, length } => match length {
                Some(n) => write!(f, "{}[{}]", base, n),
                None => write!(f, "{}[]", base),
            },
            Type::Named(name) => write!(f, "{}", name),
            Type::Size(bits) => write!(f, "__size{}", bits),
            Type::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_size() {
        let arr = Type::Array {
            base: Box::new(Type::signed(8)),
            length: Some(16),
        };
        assert!(arr.is_array());
        assert_eq!(arr.size_bits(), Some(128));

        let open = Type::Array {
            base: Box::new(Type::signed(8)),
            length: None,
        };
        assert_eq!(open.size_bits(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::unsigned(16).to_string(), "uint16");
        assert_eq!(Type::signed(32).pointer_to().to_string(), "int32*");
        assert_eq!(Type::Unknown.to_string(), "?");
    }
}
