// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![no_std]

//! Provides the [`open_enum`] macro.

/// Defines a wire-level enumeration that can hold any value of its storage
/// type.
///
/// Protocol fields such as command codes or mode bytes come from, or are
/// consumed by, another party. A Rust `enum` cannot hold a value it does not
/// name, so this macro instead generates a `#[repr(transparent)]` newtype over
/// the storage integer with one associated constant per named value.
///
/// The generated type derives `Copy`, `Clone`, `Eq`, `PartialEq`, `Hash`,
/// `Ord` and `PartialOrd`, so the constants can be used as `match` patterns.
/// `Debug` prints the constant's name, or the raw value when it has none, and
/// `name()` exposes the same lookup.
///
/// # Examples
///
/// ```
/// use open_enum::open_enum;
///
/// open_enum! {
///     pub enum Command: u32 {
///         GET_VERSION = 10,
///     }
/// }
///
/// assert_eq!(Command::GET_VERSION.0, 10);
/// assert_eq!(Command::GET_VERSION.name(), Some("GET_VERSION"));
/// assert_eq!(Command(7).name(), None);
/// ```
#[macro_export]
macro_rules! open_enum {
    (
        $(#[$a:meta])*
        $v:vis enum $name:ident : $storage:ty {
            $(#![$implattr:meta])*
            $(
                $(#[$vattr:meta])*
                $variant:ident = $value:expr,
            )*
        }
    ) => {
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[repr(transparent)]
        $(#[$a])*
        $v struct $name(pub $storage);

        $(#[$implattr])*
        impl $name {
            $(
                $(#[$vattr])*
                pub const $variant: $name = $name($value);
            )*
        }

        impl $name {
            /// Returns the name of the constant matching this value, if any.
            #[allow(dead_code, unreachable_patterns)]
            pub const fn name(self) -> Option<&'static str> {
                match self {
                    $( Self::$variant => Some(stringify!($variant)), )*
                    _ => None,
                }
            }
        }

        impl From<$storage> for $name {
            fn from(value: $storage) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $storage {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, fmt: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self.name() {
                    Some(name) => fmt.pad(name),
                    None => ::core::fmt::Debug::fmt(&self.0, fmt),
                }
            }
        }
    };
}
