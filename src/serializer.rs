//! Compact binary serialization of script trees
//!
//! The wire format is a flat stream of tagged little-endian records in
//! post-order: argument records precede the property record that consumes
//! them, property records precede the object record that owns them, and an
//! object record carries its depth so the decoder can attach buffered
//! children. Decoding is all-or-nothing.

use crate::tree::{Argument, ObjectNode, PropertyNode, ScriptTree};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use thiserror::Error;

pub const IONC_MAGIC: &[u8; 4] = b"IONC";
pub const IONC_VERSION: u16 = 1;

const TAG_ARGUMENT: u8 = 0x01;
const TAG_PROPERTY: u8 = 0x02;
const TAG_OBJECT: u8 = 0x03;

const VARIANT_BOOLEAN: u8 = 0;
const VARIANT_COLOR: u8 = 1;
const VARIANT_ENUMERABLE: u8 = 2;
const VARIANT_FLOATING_POINT: u8 = 3;
const VARIANT_INTEGER: u8 = 4;
const VARIANT_STRING: u8 = 5;
const VARIANT_VECTOR2: u8 = 6;

#[derive(Error, Debug)]
pub enum TreeDecodeError {
    #[error("not an IONC stream")]
    BadMagic,
    #[error("unsupported IONC version {0}")]
    UnsupportedVersion(u16),
    #[error("malformed record stream")]
    Malformed,
}

impl From<std::io::Error> for TreeDecodeError {
    fn from(_: std::io::Error) -> Self {
        TreeDecodeError::Malformed
    }
}

/// Write a tree to its binary form.
pub fn serialize(tree: &ScriptTree) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(IONC_MAGIC);
    out.write_u16::<LittleEndian>(IONC_VERSION)?;

    for visit in tree.depth_first_post() {
        write_object(&mut out, visit.node, visit.depth)?;
    }

    Ok(out)
}

/// One object's own records: arguments, properties, then the object itself.
/// Children were already written by the post-order walk.
fn write_object(out: &mut Vec<u8>, object: &ObjectNode, depth: usize) -> std::io::Result<()> {
    for property in &object.properties {
        for argument in &property.arguments {
            write_argument(out, argument)?;
        }
        out.push(TAG_PROPERTY);
        write_string(out, &property.name)?;
    }

    out.push(TAG_OBJECT);
    out.write_u32::<LittleEndian>(depth as u32)?;
    write_string(out, &object.name)?;
    match &object.selector {
        Some(selector) => {
            out.push(1);
            write_string(out, selector)?;
        }
        None => out.push(0),
    }
    Ok(())
}

fn write_argument(out: &mut Vec<u8>, argument: &Argument) -> std::io::Result<()> {
    out.push(TAG_ARGUMENT);
    match argument {
        Argument::Boolean(value) => {
            out.push(VARIANT_BOOLEAN);
            out.push(u8::from(*value));
        }
        Argument::Color(color) => {
            out.push(VARIANT_COLOR);
            out.write_f32::<LittleEndian>(color.r)?;
            out.write_f32::<LittleEndian>(color.g)?;
            out.write_f32::<LittleEndian>(color.b)?;
            out.write_f32::<LittleEndian>(color.a)?;
        }
        Argument::Enumerable(value) => {
            out.push(VARIANT_ENUMERABLE);
            write_string(out, value)?;
        }
        Argument::FloatingPoint(value) => {
            out.push(VARIANT_FLOATING_POINT);
            out.write_f32::<LittleEndian>(*value)?;
        }
        Argument::Integer(value) => {
            out.push(VARIANT_INTEGER);
            out.write_i32::<LittleEndian>(*value)?;
        }
        Argument::String(value) => {
            out.push(VARIANT_STRING);
            write_string(out, value)?;
        }
        Argument::Vector2(value) => {
            out.push(VARIANT_VECTOR2);
            out.write_f32::<LittleEndian>(value.x)?;
            out.write_f32::<LittleEndian>(value.y)?;
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(value.len() as u32)?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Replay a record stream back into a tree. Any malformed record discards
/// everything; no partial tree ever escapes.
pub fn deserialize(bytes: &[u8]) -> Result<ScriptTree, TreeDecodeError> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != IONC_MAGIC {
        return Err(TreeDecodeError::BadMagic);
    }
    let version = cursor.read_u16::<LittleEndian>()?;
    if version != IONC_VERSION {
        return Err(TreeDecodeError::UnsupportedVersion(version));
    }

    let mut arguments: Vec<Argument> = Vec::new();
    let mut properties: Vec<PropertyNode> = Vec::new();
    // One buffer of completed objects per depth, consumed by the parent's
    // record when it closes.
    let mut buffers: Vec<Vec<ObjectNode>> = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        match cursor.read_u8()? {
            TAG_ARGUMENT => arguments.push(read_argument(&mut cursor)?),
            TAG_PROPERTY => {
                let name = read_string(&mut cursor)?;
                properties.push(PropertyNode::new(name, std::mem::take(&mut arguments)));
            }
            TAG_OBJECT => {
                if !arguments.is_empty() {
                    return Err(TreeDecodeError::Malformed);
                }
                let depth = cursor.read_u32::<LittleEndian>()? as usize;
                let name = read_string(&mut cursor)?;
                let selector = match cursor.read_u8()? {
                    0 => None,
                    1 => Some(read_string(&mut cursor)?),
                    _ => return Err(TreeDecodeError::Malformed),
                };

                let children = buffers
                    .get_mut(depth + 1)
                    .map(std::mem::take)
                    .unwrap_or_default();

                let object = ObjectNode {
                    name,
                    selector,
                    properties: std::mem::take(&mut properties),
                    children,
                };
                while buffers.len() <= depth {
                    buffers.push(Vec::new());
                }
                buffers[depth].push(object);
            }
            _ => return Err(TreeDecodeError::Malformed),
        }
    }

    // Every record must have been consumed into the depth-0 forest.
    if !arguments.is_empty() || !properties.is_empty() {
        return Err(TreeDecodeError::Malformed);
    }
    if buffers.iter().skip(1).any(|b| !b.is_empty()) {
        return Err(TreeDecodeError::Malformed);
    }

    Ok(ScriptTree::new(buffers.into_iter().next().unwrap_or_default()))
}

fn read_argument(cursor: &mut Cursor<&[u8]>) -> Result<Argument, TreeDecodeError> {
    use crate::types::{Color, Vector2};
    match cursor.read_u8()? {
        VARIANT_BOOLEAN => match cursor.read_u8()? {
            0 => Ok(Argument::Boolean(false)),
            1 => Ok(Argument::Boolean(true)),
            _ => Err(TreeDecodeError::Malformed),
        },
        VARIANT_COLOR => Ok(Argument::Color(Color::new(
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
        ))),
        VARIANT_ENUMERABLE => Ok(Argument::Enumerable(read_string(cursor)?)),
        VARIANT_FLOATING_POINT => Ok(Argument::FloatingPoint(
            cursor.read_f32::<LittleEndian>()?,
        )),
        VARIANT_INTEGER => Ok(Argument::Integer(cursor.read_i32::<LittleEndian>()?)),
        VARIANT_STRING => Ok(Argument::String(read_string(cursor)?)),
        VARIANT_VECTOR2 => Ok(Argument::Vector2(Vector2::new(
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
        ))),
        _ => Err(TreeDecodeError::Malformed),
    }
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, TreeDecodeError> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(TreeDecodeError::Malformed);
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| TreeDecodeError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Vector2};

    fn sample_tree() -> ScriptTree {
        let mut material = ObjectNode::new("material");
        material.selector = Some("stone_floor".to_string());
        material.properties.push(PropertyNode::new(
            "diffuse",
            vec![Argument::Color(Color::new(0.5, 0.5, 0.5, 1.0))],
        ));
        material.properties.push(PropertyNode::new(
            "tiling",
            vec![Argument::Vector2(Vector2::new(2.0, 2.0))],
        ));

        let mut pass = ObjectNode::new("pass");
        pass.properties.push(PropertyNode::new(
            "blend",
            vec![
                Argument::Enumerable("alpha".to_string()),
                Argument::Boolean(true),
            ],
        ));
        material.children.push(pass);

        let mut sound = ObjectNode::new("sound");
        sound.properties.push(PropertyNode::new(
            "volume",
            vec![Argument::FloatingPoint(0.75), Argument::Integer(-3)],
        ));
        sound.properties.push(PropertyNode::new(
            "file",
            vec![Argument::String("step.wav".to_string())],
        ));

        ScriptTree::new(vec![material, sound])
    }

    #[test]
    fn test_round_trip() {
        let tree = sample_tree();
        let bytes = serialize(&tree).unwrap();
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_round_trip_empty_tree() {
        let tree = ScriptTree::default();
        let decoded = deserialize(&serialize(&tree).unwrap()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_header_layout() {
        let bytes = serialize(&ScriptTree::default()).unwrap();
        assert_eq!(&bytes[0..4], IONC_MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), IONC_VERSION);
    }

    #[test]
    fn test_children_precede_parent_record() {
        let tree = sample_tree();
        let bytes = serialize(&tree).unwrap();
        // "pass" (child) must appear in the stream before "material"
        let pass_at = bytes.windows(4).position(|w| w == b"pass").unwrap();
        let material_at = bytes.windows(8).position(|w| w == b"material").unwrap();
        assert!(pass_at < material_at);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = serialize(&sample_tree()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            deserialize(&bytes),
            Err(TreeDecodeError::BadMagic)
        ));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = serialize(&sample_tree()).unwrap();
        bytes[4] = 0xFF;
        assert!(matches!(
            deserialize(&bytes),
            Err(TreeDecodeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_truncated_stream_discards_everything() {
        let bytes = serialize(&sample_tree()).unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(deserialize(truncated).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut bytes = serialize(&ScriptTree::default()).unwrap();
        bytes.push(0x7F);
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_dangling_property_rejected() {
        let mut bytes = serialize(&ScriptTree::default()).unwrap();
        // A property record with no object to own it
        bytes.push(TAG_PROPERTY);
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"name");
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_string_length_overrun_rejected() {
        let mut bytes = serialize(&ScriptTree::default()).unwrap();
        bytes.push(TAG_ARGUMENT);
        bytes.push(VARIANT_STRING);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(deserialize(&bytes).is_err());
    }
}
