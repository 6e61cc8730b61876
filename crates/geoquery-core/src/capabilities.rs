//! Capability Descriptor: which query features a backend executes natively.
//!
//! The flags are independent. A backend may, for example, sort natively but
//! not filter.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub filter: bool,
    pub limit: bool,
    pub offset: bool,
    pub sort: bool,
    pub retype: bool,
    pub reproject: bool,
}

impl Capabilities {
    /// A backend that executes nothing natively.
    pub const fn none() -> Self {
        Self {
            filter: false,
            limit: false,
            offset: false,
            sort: false,
            retype: false,
            reproject: false,
        }
    }

    pub const fn all() -> Self {
        Self {
            filter: true,
            limit: true,
            offset: true,
            sort: true,
            retype: true,
            reproject: true,
        }
    }

    pub fn with_filter(mut self, v: bool) -> Self {
        self.filter = v;
        self
    }

    pub fn with_limit(mut self, v: bool) -> Self {
        self.limit = v;
        self
    }

    pub fn with_offset(mut self, v: bool) -> Self {
        self.offset = v;
        self
    }

    pub fn with_sort(mut self, v: bool) -> Self {
        self.sort = v;
        self
    }

    pub fn with_retype(mut self, v: bool) -> Self {
        self.retype = v;
        self
    }

    pub fn with_reproject(mut self, v: bool) -> Self {
        self.reproject = v;
        self
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            ("filter", self.filter),
            ("limit", self.limit),
            ("offset", self.offset),
            ("sort", self.sort),
            ("retype", self.retype),
            ("reproject", self.reproject),
        ];
        let native: Vec<&str> = flags.iter().filter(|(_, on)| *on).map(|(n, _)| *n).collect();
        if native.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&native.join(","))
        }
    }
}
