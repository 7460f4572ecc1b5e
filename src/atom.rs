// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use crate::property::Properties;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Atom {
    pub symbol: String,
    pub position: [f64; 3],
    /// Values of the per-atom arrays (forces, REF_forces, ...) for this atom
    pub properties: Properties,
}

impl Atom {
    pub fn new(symbol: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            symbol: symbol.into(),
            position,
            properties: Properties::new(),
        }
    }

    /// Copy of this atom moved by `shift`.
    pub fn translated(&self, shift: [f64; 3]) -> Self {
        let [x, y, z] = self.position;
        Self {
            symbol: self.symbol.clone(),
            position: [x + shift[0], y + shift[1], z + shift[2]],
            properties: self.properties.clone(),
        }
    }
}
