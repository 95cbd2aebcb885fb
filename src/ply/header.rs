// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! PLY header model: storage mode, elements, properties (scalar and list),
//! parsed from and re-serialized to the textual header every PLY variant
//! shares (spec §4.2.1).

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::reader::Source;

/// The `format` line's storage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl StorageMode {
    pub fn endian(self) -> Option<Endian> {
        match self {
            StorageMode::Ascii => None,
            StorageMode::BinaryLittleEndian => Some(Endian::Little),
            StorageMode::BinaryBigEndian => Some(Endian::Big),
        }
    }

    fn token(self) -> &'static str {
        match self {
            StorageMode::Ascii => "ascii",
            StorageMode::BinaryLittleEndian => "binary_little_endian",
            StorageMode::BinaryBigEndian => "binary_big_endian",
        }
    }

    fn from_token(tok: &str) -> Result<Self> {
        match tok {
            "ascii" => Ok(StorageMode::Ascii),
            "binary_little_endian" => Ok(StorageMode::BinaryLittleEndian),
            "binary_big_endian" => Ok(StorageMode::BinaryBigEndian),
            other => Err(Error::loader(format!("unknown format '{other}'"))),
        }
    }
}

/// One of PLY's eight scalar types, under any of its accepted spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    pub fn size(self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    pub fn from_token(tok: &str) -> Result<Self> {
        Ok(match tok {
            "char" | "int8" => ScalarType::Int8,
            "uchar" | "uint8" => ScalarType::UInt8,
            "short" | "int16" => ScalarType::Int16,
            "ushort" | "uint16" => ScalarType::UInt16,
            "int" | "int32" => ScalarType::Int32,
            "uint" | "uint32" => ScalarType::UInt32,
            "float" | "float32" => ScalarType::Float32,
            "double" | "float64" => ScalarType::Float64,
            other => return Err(Error::loader(format!("unknown property type '{other}'"))),
        })
    }

    /// Canonical spelling used when re-serializing a header.
    pub fn canonical_name(self) -> &'static str {
        match self {
            ScalarType::Int8 => "char",
            ScalarType::UInt8 => "uchar",
            ScalarType::Int16 => "short",
            ScalarType::UInt16 => "ushort",
            ScalarType::Int32 => "int",
            ScalarType::UInt32 => "uint",
            ScalarType::Float32 => "float",
            ScalarType::Float64 => "double",
        }
    }

    /// Reads one binary-encoded scalar, widened to `f64` (lossless for
    /// every variant except the bottom bits of very large `u64`-class
    /// values, which PLY never declares).
    pub fn read_binary(self, source: &mut Source, endian: Endian) -> Result<f64> {
        Ok(match self {
            ScalarType::Int8 => source.read_byte()? as f64,
            ScalarType::UInt8 => source.read_unsigned_byte()? as f64,
            ScalarType::Int16 => source.read_short_endian(endian)? as f64,
            ScalarType::UInt16 => source.read_unsigned_short_endian(endian)? as f64,
            ScalarType::Int32 => source.read_int_endian(endian)? as f64,
            ScalarType::UInt32 => source.read_unsigned_int_endian(endian)? as f64,
            ScalarType::Float32 => source.read_float_endian(endian)? as f64,
            ScalarType::Float64 => source.read_double_endian(endian)?,
        })
    }

    /// Parses one ASCII token as this scalar type. Spec §4.2.1: "floating
    /// text values that are integers are accepted".
    pub fn parse_ascii(self, token: &str) -> Result<f64> {
        match self {
            ScalarType::Float32 | ScalarType::Float64 => token
                .parse::<f64>()
                .map_err(|_| Error::loader(format!("'{token}' is not a number"))),
            _ => {
                if let Ok(i) = token.parse::<i64>() {
                    Ok(i as f64)
                } else {
                    token
                        .parse::<f64>()
                        .map_err(|_| Error::loader(format!("'{token}' is not a number")))
                }
            }
        }
    }
}

/// A scalar property, or a list property of (length type, value type).
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List {
        length_type: ScalarType,
        value_type: ScalarType,
    },
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub count: u64,
    pub properties: Vec<Property>,
}

impl Element {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// `Some(size)` if every property is a fixed-size scalar, i.e. every
    /// instance of this element occupies exactly `size` bytes in binary
    /// storage, allowing offset(i) = base + i * size without a
    /// stream-position cache.
    pub fn fixed_record_size(&self) -> Option<usize> {
        let mut total = 0;
        for p in &self.properties {
            match p.kind {
                PropertyKind::Scalar(t) => total += t.size(),
                PropertyKind::List { .. } => return None,
            }
        }
        Some(total)
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub storage_mode: StorageMode,
    pub elements: Vec<Element>,
    pub comments: Vec<String>,
    pub obj_info: Vec<String>,
    /// Byte length of the header including the `end_header` line and its
    /// terminator; the body starts here.
    pub body_offset: u64,
}

impl Header {
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Parses the textual header starting at the current position of
    /// `source` (normally offset 0). Leaves `source`'s position at the
    /// first byte of the body.
    pub fn parse(source: &mut Source) -> Result<Header> {
        let first = next_line(source)?;
        if first != "ply" {
            return Err(Error::loader("missing 'ply' magic line"));
        }
        let format_line = next_line(source)?;
        let mut tokens = format_line.split_whitespace();
        if tokens.next() != Some("format") {
            return Err(Error::loader("expected 'format' line"));
        }
        let storage_mode = StorageMode::from_token(
            tokens
                .next()
                .ok_or_else(|| Error::loader("missing storage mode"))?,
        )?;
        let version = tokens.next().unwrap_or("");
        if version != "1.0" {
            return Err(Error::loader(format!("unsupported PLY version '{version}'")));
        }

        let mut elements: Vec<Element> = Vec::new();
        let mut comments = Vec::new();
        let mut obj_info = Vec::new();

        loop {
            let line = next_line(source)?;
            if line == "end_header" {
                break;
            }
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("comment") => comments.push(rest_of(&line, "comment")),
                Some("obj_info") => obj_info.push(rest_of(&line, "obj_info")),
                Some("element") => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::loader("element missing name"))?
                        .to_string();
                    let count: u64 = tokens
                        .next()
                        .ok_or_else(|| Error::loader("element missing count"))?
                        .parse()
                        .map_err(|_| Error::loader("element count is not an integer"))?;
                    elements.push(Element {
                        name,
                        count,
                        properties: Vec::new(),
                    });
                }
                Some("property") => {
                    let element = elements
                        .last_mut()
                        .ok_or_else(|| Error::loader("property before any element"))?;
                    let next = tokens
                        .next()
                        .ok_or_else(|| Error::loader("property missing type"))?;
                    if next == "list" {
                        let length_type = ScalarType::from_token(
                            tokens
                                .next()
                                .ok_or_else(|| Error::loader("list property missing length type"))?,
                        )?;
                        let value_type = ScalarType::from_token(
                            tokens
                                .next()
                                .ok_or_else(|| Error::loader("list property missing value type"))?,
                        )?;
                        let name = tokens
                            .next()
                            .ok_or_else(|| Error::loader("list property missing name"))?
                            .to_string();
                        element.properties.push(Property {
                            name,
                            kind: PropertyKind::List {
                                length_type,
                                value_type,
                            },
                        });
                    } else {
                        let scalar = ScalarType::from_token(next)?;
                        let name = tokens
                            .next()
                            .ok_or_else(|| Error::loader("scalar property missing name"))?
                            .to_string();
                        element.properties.push(Property {
                            name,
                            kind: PropertyKind::Scalar(scalar),
                        });
                    }
                }
                Some(other) => return Err(Error::loader(format!("unknown header directive '{other}'"))),
                None => return Err(Error::loader("blank line in header")),
            }
        }

        Ok(Header {
            storage_mode,
            elements,
            comments,
            obj_info,
            body_offset: source.position(),
        })
    }

    /// Re-serializes this header to PLY's textual form, `\n`-terminated
    /// including the final `end_header` line. Round-trips element order,
    /// property order, and counts (spec §8 header/magic round-trip).
    pub fn to_string(&self) -> String {
        let mut out = String::new();
        out.push_str("ply\n");
        out.push_str(&format!("format {} 1.0\n", self.storage_mode.token()));
        for c in &self.comments {
            out.push_str(&format!("comment {c}\n"));
        }
        for o in &self.obj_info {
            out.push_str(&format!("obj_info {o}\n"));
        }
        for element in &self.elements {
            out.push_str(&format!("element {} {}\n", element.name, element.count));
            for property in &element.properties {
                match &property.kind {
                    PropertyKind::Scalar(t) => {
                        out.push_str(&format!("property {} {}\n", t.canonical_name(), property.name))
                    }
                    PropertyKind::List {
                        length_type,
                        value_type,
                    } => out.push_str(&format!(
                        "property list {} {} {}\n",
                        length_type.canonical_name(),
                        value_type.canonical_name(),
                        property.name
                    )),
                }
            }
        }
        out.push_str("end_header\n");
        out
    }
}

fn next_line(source: &mut Source) -> Result<String> {
    source
        .read_line()?
        .ok_or_else(|| Error::loader("unexpected end of header"))
}

fn rest_of(line: &str, directive: &str) -> String {
    line.strip_prefix(directive)
        .unwrap_or(line)
        .trim_start()
        .to_string()
}

/// The vertex element's accepted texture-coordinate property name pairs,
/// in order of preference. `textureCoordiantes_u`/`_v` preserves a typo
/// from the original format's source that several PLY exporters copied
/// verbatim; it is accepted on ingest but never produced on encode.
pub const TEXCOORD_ALIASES: &[(&str, &str)] = &[
    ("s", "t"),
    ("u", "v"),
    ("texture_u", "texture_v"),
    ("textureCoordiantes_u", "textureCoordiantes_v"),
];
