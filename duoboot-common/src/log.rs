// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Logging shim: `defmt` macros when the `defmt` feature is enabled, no-ops otherwise.
//!
//! The no-op variants still borrow their arguments so values that are only
//! logged do not trigger unused warnings on host builds.

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, error, info, warn};

#[cfg(not(feature = "defmt"))]
macro_rules! noop_log {
    ( $fmt:expr $(, $arg:expr )* $(,)? ) => {{
        let _ = $fmt;
        $( let _ = &$arg; )*
    }};
}

#[cfg(not(feature = "defmt"))]
pub(crate) use noop_log as debug;
#[cfg(not(feature = "defmt"))]
pub(crate) use noop_log as error;
#[cfg(not(feature = "defmt"))]
pub(crate) use noop_log as info;
#[cfg(not(feature = "defmt"))]
pub(crate) use noop_log as warn;
