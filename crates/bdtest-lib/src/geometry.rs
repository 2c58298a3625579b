//! Built-in storage geometries
//!
//! A geometry fixes some of the leading geometry defines (read, program and
//! block size, block count). Unset fields fall through to the implicit
//! defaults, so e.g. `READ_SIZE` follows `PROG_SIZE` unless a geometry or
//! case says otherwise.

use thiserror::Error;

use crate::defines::{
    Define, DefineValue, BLOCK_COUNT, BLOCK_SIZE, GEOMETRY_DEFINE_COUNT, PROG_SIZE, READ_SIZE,
};
use crate::permutation::{Assignment, Axis};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Unknown geometry: {0}")]
    Unknown(String),
}

/// A named storage geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub name: &'static str,
    /// Values for the geometry defines, indexed like the name table.
    pub defines: [Option<DefineValue>; GEOMETRY_DEFINE_COUNT],
}

impl Geometry {
    /// The defines this geometry sets.
    pub fn assignment(&self) -> Assignment {
        self.defines
            .iter()
            .enumerate()
            .filter_map(|(index, value)| value.map(|v| (index, Define::Const(v))))
            .collect()
    }

    pub fn read_size(&self) -> Option<DefineValue> {
        self.defines[READ_SIZE]
    }

    pub fn prog_size(&self) -> Option<DefineValue> {
        self.defines[PROG_SIZE]
    }

    pub fn block_size(&self) -> Option<DefineValue> {
        self.defines[BLOCK_SIZE]
    }

    pub fn block_count(&self) -> Option<DefineValue> {
        self.defines[BLOCK_COUNT]
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub const BUILTIN_GEOMETRIES: [Geometry; 5] = [
    Geometry {
        name: "default",
        defines: [None, Some(16), Some(512), None],
    },
    Geometry {
        name: "eeprom",
        defines: [None, Some(1), Some(512), None],
    },
    Geometry {
        name: "emmc",
        defines: [None, None, Some(512), None],
    },
    Geometry {
        name: "nor",
        defines: [None, Some(1), Some(4096), None],
    },
    Geometry {
        name: "nand",
        defines: [None, Some(4096), Some(32768), None],
    },
];

/// Look up a built-in geometry by name.
pub fn find(name: &str) -> Result<&'static Geometry, GeometryError> {
    BUILTIN_GEOMETRIES
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| GeometryError::Unknown(name.to_string()))
}

/// Resolve a list of names. `all` expands to every built-in geometry.
pub fn find_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static Geometry>, GeometryError> {
    let mut out: Vec<&'static Geometry> = Vec::new();
    for name in names {
        let name = name.as_ref();
        let found: Vec<&'static Geometry> = if name == "all" {
            BUILTIN_GEOMETRIES.iter().collect()
        } else {
            vec![find(name)?]
        };
        // first occurrence wins, order is kept
        for geometry in found {
            if !out.iter().any(|g| g.name == geometry.name) {
                out.push(geometry);
            }
        }
    }
    Ok(out)
}

/// A permutation axis over the given geometries.
pub fn axis(geometries: &[&Geometry]) -> Axis {
    Axis::new(
        "geometry",
        geometries.iter().map(|g| g.assignment()).collect(),
    )
}
