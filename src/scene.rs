use std::fs;
use std::path::{Path, PathBuf};

use scene_types::SCENE_TEXT;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::{InputError, SceneError};

// ── Discovery ────────────────────────────────────────────────────────────

/// Resolve a file-or-directory argument into the scene files to process.
///
/// A file must have a `.json` extension. A directory contributes its
/// immediate `*.json` children, sorted by path, and must have at least one.
pub fn discover_scene_files(path: &Path) -> Result<Vec<PathBuf>, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    if path.is_file() {
        if !is_json(path) {
            return Err(InputError::NotJson(path.to_path_buf()));
        }
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        return Err(InputError::NotFileOrDir(path.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| InputError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() && is_json(entry.path()) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(InputError::NoJsonFiles(path.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

// ── Scene documents ──────────────────────────────────────────────────────

/// One scene file: a JSON object with at least a string `scene_text`.
/// Other fields are carried through untouched, in their original order.
#[derive(Debug, Clone)]
pub struct Scene {
    path: PathBuf,
    text: String,
    fields: Map<String, Value>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let raw = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| SceneError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(fields) = value else {
            return Err(SceneError::NotObject(path.to_path_buf()));
        };
        let text = match fields.get(SCENE_TEXT) {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(SceneError::MissingSceneText(path.to_path_buf())),
        };

        Ok(Scene {
            path: path.to_path_buf(),
            text,
            fields,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Rewrite the file in place with every field.
    pub fn save(&self) -> Result<(), SceneError> {
        let json = serde_json::to_string_pretty(&self.fields).map_err(|source| SceneError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| SceneError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Materialize segmented scenes as `scene_001.json`, `scene_002.json`, ...
pub fn write_scenes(scenes: &[String], out_dir: &Path) -> Result<Vec<PathBuf>, SceneError> {
    fs::create_dir_all(out_dir).map_err(|source| SceneError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(scenes.len());
    for (i, scene) in scenes.iter().enumerate() {
        let path = out_dir.join(format!("scene_{:03}.json", i + 1));
        let mut fields = Map::new();
        fields.insert(SCENE_TEXT.to_string(), Value::String(scene.clone()));
        let json = serde_json::to_string_pretty(&fields).map_err(|source| SceneError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| SceneError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}
