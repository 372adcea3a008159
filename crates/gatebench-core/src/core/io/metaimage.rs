//! MetaImage (`.mhd`) reader and writer.
//!
//! The header is a list of `Key = Value` lines ending with `ElementDataFile`. The payload
//! either lives in a separate raw file next to the header or, with `ElementDataFile = LOCAL`,
//! directly after the header in the same file.

use crate::core::models::image::Image;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MetaImageError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: io::Error,
    },
    #[error("Missing header field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid value for header field '{field}': '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("Unsupported element type '{0}'")]
    UnsupportedElementType(String),
    #[error("Compressed MetaImage payloads are not supported")]
    Compressed,
    #[error("Payload holds {found} bytes, header describes {expected}")]
    PayloadSize { expected: usize, found: usize },
    #[error("Image is inconsistent: data length does not match its size and channels")]
    InconsistentImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    UChar,
    Char,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ElementType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "MET_UCHAR" => ElementType::UChar,
            "MET_CHAR" => ElementType::Char,
            "MET_SHORT" => ElementType::Short,
            "MET_USHORT" => ElementType::UShort,
            "MET_INT" => ElementType::Int,
            "MET_UINT" => ElementType::UInt,
            "MET_FLOAT" => ElementType::Float,
            "MET_DOUBLE" => ElementType::Double,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::UChar => "MET_UCHAR",
            ElementType::Char => "MET_CHAR",
            ElementType::Short => "MET_SHORT",
            ElementType::UShort => "MET_USHORT",
            ElementType::Int => "MET_INT",
            ElementType::UInt => "MET_UINT",
            ElementType::Float => "MET_FLOAT",
            ElementType::Double => "MET_DOUBLE",
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            ElementType::UChar | ElementType::Char => 1,
            ElementType::Short | ElementType::UShort => 2,
            ElementType::Int | ElementType::UInt | ElementType::Float => 4,
            ElementType::Double => 8,
        }
    }

    fn decode(self, b: &[u8], msb: bool) -> f64 {
        macro_rules! read {
            ($t:ty, $n:literal) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&b[..$n]);
                if msb {
                    <$t>::from_be_bytes(raw) as f64
                } else {
                    <$t>::from_le_bytes(raw) as f64
                }
            }};
        }
        match self {
            ElementType::UChar => b[0] as f64,
            ElementType::Char => b[0] as i8 as f64,
            ElementType::Short => read!(i16, 2),
            ElementType::UShort => read!(u16, 2),
            ElementType::Int => read!(i32, 4),
            ElementType::UInt => read!(u32, 4),
            ElementType::Float => read!(f32, 4),
            ElementType::Double => read!(f64, 8),
        }
    }

    /// Appends `value` little-endian; integer types round and saturate.
    fn encode(self, value: f64, out: &mut Vec<u8>) {
        let r = value.round();
        match self {
            ElementType::UChar => out.push(r as u8),
            ElementType::Char => out.push(r as i8 as u8),
            ElementType::Short => out.extend_from_slice(&(r as i16).to_le_bytes()),
            ElementType::UShort => out.extend_from_slice(&(r as u16).to_le_bytes()),
            ElementType::Int => out.extend_from_slice(&(r as i32).to_le_bytes()),
            ElementType::UInt => out.extend_from_slice(&(r as u32).to_le_bytes()),
            ElementType::Float => out.extend_from_slice(&(value as f32).to_le_bytes()),
            ElementType::Double => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

fn io_error(path: &Path, source: io::Error) -> MetaImageError {
    MetaImageError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// Reads a MetaImage header and its payload into an [`Image`] of `f64` values.
pub fn read_metaimage(path: &Path) -> Result<Image, MetaImageError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut cursor = 0;
    let mut data_file = None;
    while cursor < bytes.len() {
        let end = bytes[cursor..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| cursor + p + 1);
        let line = String::from_utf8_lossy(&bytes[cursor..end]);
        cursor = end;
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim().to_string(), value.trim().to_string());
        if key == "ElementDataFile" {
            data_file = Some(value);
            break;
        }
        fields.insert(key, value);
    }
    let data_file = data_file.ok_or(MetaImageError::MissingField("ElementDataFile"))?;

    if fields
        .get("CompressedData")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return Err(MetaImageError::Compressed);
    }

    let size: Vec<usize> = parse_list(&fields, "DimSize")?;
    let dims = match fields.get("NDims") {
        Some(v) => v.parse::<usize>().map_err(|_| MetaImageError::InvalidField {
            field: "NDims",
            value: v.clone(),
        })?,
        None => size.len(),
    };
    if size.len() != dims {
        return Err(MetaImageError::InvalidField {
            field: "DimSize",
            value: format!("{:?}", size),
        });
    }
    let spacing = optional_list(&fields, "ElementSpacing", dims, 1.0)?;
    let origin_key = if fields.contains_key("Offset") {
        "Offset"
    } else {
        "Position"
    };
    let origin = optional_list(&fields, origin_key, dims, 0.0)?;
    let channels = match fields.get("ElementNumberOfChannels") {
        Some(v) => v.parse::<usize>().map_err(|_| MetaImageError::InvalidField {
            field: "ElementNumberOfChannels",
            value: v.clone(),
        })?,
        None => 1,
    };
    let type_name = fields
        .get("ElementType")
        .ok_or(MetaImageError::MissingField("ElementType"))?;
    let element_type = ElementType::from_name(type_name)
        .ok_or_else(|| MetaImageError::UnsupportedElementType(type_name.clone()))?;
    let msb = fields
        .get("BinaryDataByteOrderMSB")
        .or_else(|| fields.get("ElementByteOrderMSB"))
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let payload = if data_file.eq_ignore_ascii_case("LOCAL") {
        bytes[cursor..].to_vec()
    } else {
        let raw_path = path
            .parent()
            .map(|dir| dir.join(&data_file))
            .unwrap_or_else(|| PathBuf::from(&data_file));
        fs::read(&raw_path).map_err(|e| io_error(&raw_path, e))?
    };

    let count = size.iter().product::<usize>() * channels;
    let expected = count * element_type.byte_size();
    if payload.len() < expected {
        return Err(MetaImageError::PayloadSize {
            expected,
            found: payload.len(),
        });
    }
    let data = payload[..expected]
        .chunks_exact(element_type.byte_size())
        .map(|chunk| element_type.decode(chunk, msb))
        .collect();

    debug!(path = %path.display(), ?size, channels, "Read MetaImage.");
    Ok(Image {
        size,
        spacing,
        origin,
        channels,
        data,
    })
}

/// Writes `image` as `<path>` (header) plus a raw payload named after the header's stem.
pub fn write_metaimage(
    image: &Image,
    path: &Path,
    element_type: ElementType,
) -> Result<(), MetaImageError> {
    if !image.is_consistent() {
        return Err(MetaImageError::InconsistentImage);
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let raw_name = format!("{stem}.raw");
    let raw_path = path.with_file_name(&raw_name);

    let join = |v: &[f64]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ");
    let identity = (0..image.dims())
        .flat_map(|i| (0..image.dims()).map(move |j| if i == j { "1" } else { "0" }))
        .collect::<Vec<_>>()
        .join(" ");
    let header = format!(
        "ObjectType = Image\n\
         NDims = {}\n\
         BinaryData = True\n\
         BinaryDataByteOrderMSB = False\n\
         CompressedData = False\n\
         TransformMatrix = {}\n\
         Offset = {}\n\
         ElementSpacing = {}\n\
         DimSize = {}\n\
         ElementNumberOfChannels = {}\n\
         ElementType = {}\n\
         ElementDataFile = {}\n",
        image.dims(),
        identity,
        join(&image.origin),
        join(&image.spacing),
        image
            .size
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        image.channels,
        element_type.name(),
        raw_name,
    );

    let mut payload = Vec::with_capacity(image.data.len() * element_type.byte_size());
    for &v in &image.data {
        element_type.encode(v, &mut payload);
    }

    fs::write(path, header).map_err(|e| io_error(path, e))?;
    fs::write(&raw_path, payload).map_err(|e| io_error(&raw_path, e))?;
    debug!(path = %path.display(), "Wrote MetaImage.");
    Ok(())
}

fn parse_list<T: std::str::FromStr>(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<Vec<T>, MetaImageError> {
    let value = fields.get(field).ok_or(MetaImageError::MissingField(field))?;
    value
        .split_whitespace()
        .map(|t| t.parse::<T>())
        .collect::<Result<Vec<T>, _>>()
        .map_err(|_| MetaImageError::InvalidField {
            field,
            value: value.clone(),
        })
}

fn optional_list(
    fields: &HashMap<String, String>,
    field: &'static str,
    dims: usize,
    default: f64,
) -> Result<Vec<f64>, MetaImageError> {
    if !fields.contains_key(field) {
        return Ok(vec![default; dims]);
    }
    let values: Vec<f64> = parse_list(fields, field)?;
    if values.len() != dims {
        return Err(MetaImageError::InvalidField {
            field,
            value: format!("{:?}", values),
        });
    }
    Ok(values)
}
