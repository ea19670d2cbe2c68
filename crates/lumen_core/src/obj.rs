//! Wavefront OBJ/MTL import.

use std::path::Path;

use lumen_math::Vec3;

use crate::face::Face;
use crate::material::Material;
use crate::scene::{Scene, SceneResult};
use crate::texture::TextureCache;

/// Load a triangulated OBJ file and its MTL library into a [`Scene`].
///
/// Faces without a material are assigned a trailing default material.
/// Texture maps resolve relative to the OBJ file's directory; maps that fail
/// to load are logged and left absent.
pub fn load_obj<P: AsRef<Path>>(path: P) -> SceneResult<Scene> {
    let path = path.as_ref();
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )?;

    let materials = match materials {
        Ok(m) => m,
        Err(e) => {
            log::warn!("No material library for {}: {}", path.display(), e);
            Vec::new()
        }
    };

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scene".to_string());
    let mut scene = Scene::new(name);

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut cache = TextureCache::with_base_dir(base_dir);
    for mtl in &materials {
        scene.add_material(convert_material(mtl, &mut cache));
    }

    let mut default_material = None;
    for model in &models {
        let mesh = &model.mesh;
        let mat_ind = match mesh.material_id {
            Some(id) if id < scene.material_count() => id,
            _ => *default_material
                .get_or_insert_with(|| scene.add_material(Material::default())),
        };

        let has_normals = !mesh.normals.is_empty();
        let has_uvs = !mesh.texcoords.is_empty();

        for tri in mesh.indices.chunks_exact(3) {
            let mut verts = [Vec3::ZERO; 3];
            let mut norms = [Vec3::ZERO; 3];
            let mut tex = [Vec3::ZERO; 3];
            for (k, &idx) in tri.iter().enumerate() {
                let i = idx as usize;
                verts[k] = Vec3::from_slice(&mesh.positions[i * 3..i * 3 + 3]);
                if has_normals {
                    norms[k] = Vec3::from_slice(&mesh.normals[i * 3..i * 3 + 3]);
                }
                if has_uvs {
                    tex[k] = Vec3::new(mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1], 0.0);
                }
            }
            scene.add_face(Face::new(verts, norms, tex, mat_ind).with_smoothing(has_normals));
        }
    }

    log::info!(
        "Loaded {}: {} faces, {} materials, {} textures ({:.1} MB)",
        path.display(),
        scene.face_count(),
        scene.material_count(),
        cache.len(),
        cache.total_size_bytes() as f32 / (1024.0 * 1024.0)
    );

    Ok(scene)
}

fn convert_material(mtl: &tobj::Material, cache: &mut TextureCache) -> Material {
    let defaults = Material::default();
    let params = &mtl.unknown_param;

    let mut load_map = |file: &Option<String>| {
        let file = file.as_deref()?;
        match cache.load(file) {
            Ok(map) => Some(map),
            Err(e) => {
                log::warn!("Material '{}': skipping map {}: {}", mtl.name, file, e);
                None
            }
        }
    };

    Material {
        name: mtl.name.clone(),
        ns: mtl.shininess.unwrap_or(defaults.ns),
        ni: mtl.optical_density.unwrap_or(defaults.ni),
        d: mtl.dissolve.unwrap_or(defaults.d),
        tr: params.get("Tr").and_then(|v| parse_f32(v)).unwrap_or(defaults.tr),
        tf: params.get("Tf").and_then(|v| parse_vec3(v)).unwrap_or(defaults.tf),
        illum: mtl.illumination_model.map(i32::from).unwrap_or(defaults.illum),
        ka: mtl.ambient.map(Vec3::from).unwrap_or(defaults.ka),
        kd: mtl.diffuse.map(Vec3::from).unwrap_or(defaults.kd),
        ks: mtl.specular.map(Vec3::from).unwrap_or(defaults.ks),
        ke: mtl.emissive.map(Vec3::from).unwrap_or(defaults.ke),
        map_kd: load_map(&mtl.diffuse_texture),
        map_ks: load_map(&mtl.specular_texture),
        map_bump: load_map(&mtl.normal_texture),
        map_d: load_map(&mtl.dissolve_texture),
    }
}

/// First number of an MTL statement tobj leaves unparsed.
fn parse_f32(value: &str) -> Option<f32> {
    value.split_whitespace().next()?.parse().ok()
}

/// One number means grey, three mean RGB.
fn parse_vec3(value: &str) -> Option<Vec3> {
    let values: Vec<f32> = value
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    match values.as_slice() {
        [v] => Some(Vec3::splat(*v)),
        [x, y, z, ..] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialModel;
    use std::fs;

    const QUAD_OBJ: &str = "\
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl light
f 1/1 2/2 3/3 4/4
";

    const QUAD_MTL: &str = "\
newmtl light
Kd 0.2 0.3 0.4
Ke 5 5 5
illum 2

newmtl glass
Kd 1 1 1
Ks 0.1 0.1 0.1
Ns 40
Ni 1.5
d 0.9
Tr 0.25
Tf 0.5 0.6 0.7
illum 7
";

    #[test]
    fn test_load_quad_with_material() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), QUAD_OBJ).unwrap();
        fs::write(dir.path().join("quad.mtl"), QUAD_MTL).unwrap();

        let scene = load_obj(dir.path().join("quad.obj")).unwrap();
        assert_eq!(scene.name, "quad");
        assert_eq!(scene.face_count(), 2);
        assert_eq!(scene.material_count(), 2);

        let mat = &scene.materials[0];
        assert_eq!(mat.name, "light");
        assert_eq!(mat.kd, Vec3::new(0.2, 0.3, 0.4));
        assert_eq!(mat.ke, Vec3::splat(5.0));
        assert_eq!(mat.illum, 2);
        assert_eq!(mat.model(), MaterialModel::Emissive);

        let glass = &scene.materials[1];
        assert_eq!(glass.name, "glass");
        assert_eq!(glass.ks, Vec3::splat(0.1));
        assert_eq!(glass.ns, 40.0);
        assert_eq!(glass.ni, 1.5);
        assert_eq!(glass.d, 0.9);
        assert_eq!(glass.tr, 0.25);
        assert_eq!(glass.tf, Vec3::new(0.5, 0.6, 0.7));
        assert_eq!(glass.illum, 7);
        assert_eq!(glass.ke, Vec3::ZERO);
        assert_eq!(glass.model(), MaterialModel::Refractive);

        for face in &scene.faces {
            assert_eq!(face.mat_ind, 0);
            assert!(!face.smoothing);
            assert!((face.normal - Vec3::Z).length() < 1e-5);
        }
        scene.validate().unwrap();
    }

    #[test]
    fn test_missing_material_gets_default() {
        let dir = tempfile::tempdir().unwrap();
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        fs::write(dir.path().join("tri.obj"), obj).unwrap();

        let scene = load_obj(dir.path().join("tri.obj")).unwrap();
        assert_eq!(scene.face_count(), 1);
        assert_eq!(scene.material_count(), 1);
        assert_eq!(scene.faces[0].mat_ind, 0);
        assert!(scene.faces[0].smoothing);
    }

    #[test]
    fn test_missing_texture_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let obj = "mtllib m.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl tex\nf 1 2 3\n";
        let mtl = "newmtl tex\nKd 1 1 1\nmap_Kd missing.png\n";
        fs::write(dir.path().join("t.obj"), obj).unwrap();
        fs::write(dir.path().join("m.mtl"), mtl).unwrap();

        let scene = load_obj(dir.path().join("t.obj")).unwrap();
        assert!(scene.materials[0].map_kd.is_none());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_obj("/nonexistent/definitely/not/here.obj").is_err());
    }

    #[test]
    fn test_param_parsing() {
        assert_eq!(parse_f32("0.25"), Some(0.25));
        assert_eq!(parse_f32(" 0.5 extra"), Some(0.5));
        assert_eq!(parse_f32("none"), None);
        assert_eq!(parse_vec3("0.5"), Some(Vec3::splat(0.5)));
        assert_eq!(parse_vec3("1 2 3"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parse_vec3(""), None);
    }
}
