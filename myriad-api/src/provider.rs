//! 脚本定义提供者
//!
//! 二进制库容器格式属于外部协作方，本 crate 不定义它；集成方只需
//! 实现 [`ScriptSource`]，产出完整的脚本定义与字符串表。这里附带一个
//! JSON manifest 实现作为参考提供者。

use serde::{Deserialize, Serialize};

use myriad_core::{Library, ScriptDefinition};

use crate::error::MyriadError;

/// 脚本定义的来源
///
/// 实现方负责向 Library 注入脚本定义（按 id 和/或名字）与字符串表。
pub trait ScriptSource {
    fn populate(&self, library: &mut Library) -> Result<(), MyriadError>;
}

/// JSON manifest：脚本与字符串的清单
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub scripts: Vec<ManifestScript>,
    #[serde(default)]
    pub strings: Vec<ManifestString>,
}

/// manifest 中的一条脚本；id 与 name 至少要有一个
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestScript {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    /// 字节码（JSON 数组）
    pub code: Vec<u8>,
    #[serde(default)]
    pub code_offset: u32,
    #[serde(default)]
    pub entry_point: u32,
    /// 省略时采用默认几何参数
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub stack_size: Option<usize>,
}

/// manifest 中的一条字符串表项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestString {
    pub id: u32,
    pub text: String,
}

impl Manifest {
    /// 从 JSON 文本解析
    pub fn from_json(text: &str) -> Result<Self, MyriadError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ManifestScript {
    fn definition(&self) -> ScriptDefinition {
        let mut definition = ScriptDefinition::new(self.code.clone())
            .with_code_offset(self.code_offset)
            .with_entry_point(self.entry_point);
        if let Some(memory_size) = self.memory_size {
            definition = definition.with_memory_size(memory_size);
        }
        if let Some(stack_size) = self.stack_size {
            definition = definition.with_stack_size(stack_size);
        }
        definition
    }
}

impl ScriptSource for Manifest {
    fn populate(&self, library: &mut Library) -> Result<(), MyriadError> {
        for entry in &self.scripts {
            if entry.id.is_none() && entry.name.is_none() {
                return Err(MyriadError::Manifest(
                    "script entry needs an id or a name".into(),
                ));
            }
            let definition = entry.definition();
            if let Some(id) = entry.id {
                if !library.add_script(id, definition.clone()) {
                    return Err(MyriadError::Manifest(format!("duplicate script id {id}")));
                }
            }
            if let Some(name) = &entry.name {
                if !library.add_named_script(name.clone(), definition.clone()) {
                    return Err(MyriadError::Manifest(format!(
                        "duplicate script name '{name}'"
                    )));
                }
            }
        }
        for string in &self.strings {
            if !library.add_string(string.id, string.text.clone()) {
                return Err(MyriadError::Manifest(format!(
                    "duplicate string id {}",
                    string.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "scripts": [
            { "id": 1, "name": "idle", "code": [47], "memory_size": 256, "stack_size": 64 },
            { "name": "noop", "code": [0, 47] }
        ],
        "strings": [
            { "id": 10, "text": "idle" }
        ]
    }"#;

    #[test]
    fn test_manifest_parses_and_populates() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.scripts.len(), 2);

        let mut library = Library::new();
        manifest.populate(&mut library).unwrap();
        assert_eq!(library.string(10), Some("idle"));
        assert!(library.start_script(1, &[]).is_ok());
        assert!(library.start_named_script("idle", &[]).is_ok());
        assert!(library.start_named_script("noop", &[]).is_ok());
    }

    #[test]
    fn test_manifest_defaults_applied() {
        let manifest = Manifest::from_json(r#"{ "scripts": [{ "id": 1, "code": [47] }] }"#).unwrap();
        let definition = manifest.scripts[0].definition();
        assert_eq!(definition.memory_size(), 65536);
        assert_eq!(definition.stack_size(), 2500);
        assert_eq!(definition.entry_point(), 0);
    }

    #[test]
    fn test_manifest_entry_without_id_or_name_rejected() {
        let manifest = Manifest::from_json(r#"{ "scripts": [{ "code": [47] }] }"#).unwrap();
        let mut library = Library::new();
        assert!(matches!(
            manifest.populate(&mut library).unwrap_err(),
            MyriadError::Manifest(_)
        ));
    }

    #[test]
    fn test_manifest_duplicate_id_rejected() {
        let manifest = Manifest::from_json(
            r#"{ "scripts": [
                { "id": 1, "code": [47] },
                { "id": 1, "code": [0] }
            ] }"#,
        )
        .unwrap();
        let mut library = Library::new();
        assert!(manifest.populate(&mut library).is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            Manifest::from_json("{ scripts: [] }").unwrap_err(),
            MyriadError::Json(_)
        ));
    }
}
