//! glTF 2.0 structure reader: enough to place a model in the scene and drive
//! its animation clips. Geometry stays in the binary blob for the renderer.

use gltf::Gltf;

use super::{AnimationClip, ModelAsset};
use crate::Result;

/// Reads a `.glb` container or a plain `.gltf` JSON document.
pub fn parse_model(bytes: &[u8]) -> Result<ModelAsset> {
    let gltf = Gltf::from_slice(bytes)?;

    let clips = gltf
        .animations()
        .map(|animation| AnimationClip {
            name: animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index())),
            duration: animation
                .samplers()
                .filter_map(|sampler| input_max(&sampler.input()))
                .fold(0.0, f32::max),
        })
        .collect();

    let model = ModelAsset {
        node_count: gltf.nodes().count(),
        mesh_count: gltf.meshes().count(),
        material_count: gltf.materials().count(),
        clips,
        binary_len: gltf.blob.as_ref().map(Vec::len).unwrap_or(0),
    };
    tracing::debug!(
        nodes = model.node_count,
        meshes = model.mesh_count,
        clips = model.clips.len(),
        "parsed model"
    );
    Ok(model)
}

/// Last keyframe time of a sampler's input accessor.
fn input_max(accessor: &gltf::Accessor<'_>) -> Option<f32> {
    accessor
        .max()?
        .as_array()?
        .first()?
        .as_f64()
        .map(|max| max as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_support::{glb_bytes, MODEL_JSON},
        BackdropError,
    };

    #[test]
    fn reads_glb_container() {
        let model = parse_model(&glb_bytes(MODEL_JSON, &[0; 16])).unwrap();
        assert_eq!(model.node_count, 2);
        assert_eq!(model.mesh_count, 1);
        assert_eq!(model.material_count, 1);
        assert_eq!(model.binary_len, 16);
        assert_eq!(model.clips.len(), 2);
        assert_eq!(model.clips[0].name, "hover");
        assert_eq!(model.clips[0].duration, 2.0);
        assert_eq!(model.clips[1].name, "animation_1");
        assert_eq!(model.clips[1].duration, 0.0);
    }

    #[test]
    fn reads_plain_json() {
        let model = parse_model(MODEL_JSON.as_bytes()).unwrap();
        assert_eq!(model.node_count, 2);
        assert_eq!(model.binary_len, 0);
        assert_eq!(model.clips.len(), 2);
    }

    #[test]
    fn rejects_truncated_container() {
        let mut bytes = glb_bytes(MODEL_JSON, &[]);
        bytes.truncate(20);
        assert!(matches!(parse_model(&bytes), Err(BackdropError::Gltf(_))));
    }

    #[test]
    fn rejects_dangling_accessor() {
        let json = MODEL_JSON.replace(r#""input": 2"#, r#""input": 9"#);
        assert!(matches!(
            parse_model(json.as_bytes()),
            Err(BackdropError::Gltf(_))
        ));
    }
}
