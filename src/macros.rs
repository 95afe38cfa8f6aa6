/*
 * Copyright 2023, Sayan Nandan <nandansayan@outlook.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
*/

#![allow(unused_macros)] // This is done just to avoid unnecessary complications

macro_rules! cfg_aio {
    ($($body:item)*) => {
        $(
            #[cfg(feature = "aio")]
            #[cfg_attr(docsrs, doc(cfg(feature = "aio")))]
            $body
        )*
    };
}

/// Implements `From<$ty> for $target` by routing through a variant constructor
macro_rules! impl_from_variant {
    ($target:ident => $($variant:ident($($ty:ty),*)),* $(,)?) => {
        $($(
            impl From<$ty> for $target {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*)*
    };
}

/// Define a typed bitset for native command/response flags
macro_rules! native_flags {
    (
        $(#[$attr:meta])*
        pub struct $name:ident($repr:ty) {
            $($(#[$fattr:meta])* const $flag:ident = $val:expr;)*
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
        pub struct $name($repr);
        impl $name {
            $($(#[$fattr])* pub const $flag: Self = Self($val);)*
            /// No flags set
            pub const fn empty() -> Self {
                Self(0)
            }
            /// Returns the raw bits
            pub const fn bits(&self) -> $repr {
                self.0
            }
            /// Build from raw bits (unknown bits are kept)
            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }
            /// Returns true if all the bits of `other` are set in `self`
            pub const fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }
        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0
            }
        }
    };
}
