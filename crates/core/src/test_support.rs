//! Fixture builders shared by the unit tests.

use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb, Rgba};

/// Two nodes, one mesh and material, and two clips: "hover" lasting 2s and
/// an unnamed one without keyframe bounds.
pub const MODEL_JSON: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [{ "mesh": 0, "children": [1] }, {}],
    "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
    "materials": [{}],
    "buffers": [{ "byteLength": 16 }],
    "accessors": [
        { "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] },
        { "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [0.5] },
        { "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [2.0] },
        { "componentType": 5126, "count": 2, "type": "VEC3" },
        { "componentType": 5126, "count": 2, "type": "SCALAR" }
    ],
    "animations": [
        {
            "name": "hover",
            "channels": [
                { "sampler": 0, "target": { "node": 0, "path": "translation" } },
                { "sampler": 1, "target": { "node": 1, "path": "translation" } }
            ],
            "samplers": [{ "input": 1, "output": 3 }, { "input": 2, "output": 3 }]
        },
        {
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "scale" } }],
            "samplers": [{ "input": 4, "output": 3 }]
        }
    ]
}"#;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgba([10_u8, 20, 30, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Radiance HDR image with every texel set to `value`.
pub fn hdr_bytes(width: u32, height: u32, value: f32) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgb([value, value, value]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Hdr)
        .unwrap();
    bytes
}

/// Packs a JSON document and optional binary payload into a `.glb`.
pub fn glb_bytes(json: &str, binary: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = binary.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let mut total = 12 + 8 + json.len();
    if !bin.is_empty() {
        total += 8 + bin.len();
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2_u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534A_u32.to_le_bytes());
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x004E_4942_u32.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}
