use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::util::read_artifact_to_string;

pub const COLUMNS_JSON: &str = "columns_order.json";
pub const COLUMNS_JSON_GZ: &str = "columns_order.json.gz";
pub const COLUMNS_TXT: &str = "columns_order.txt";

/// 在 model_dir 里按 json > json.gz > txt 的顺序找列顺序文件
pub fn select_columns_file(dir: &Path) -> Option<PathBuf> {
    [COLUMNS_JSON, COLUMNS_JSON_GZ, COLUMNS_TXT]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

pub fn load_columns_from_dir(dir: &Path) -> Result<(PathBuf, Vec<String>)> {
    let path = select_columns_file(dir).ok_or_else(|| {
        anyhow!(
            "missing column order in model_dir={}, expected {COLUMNS_JSON}, {COLUMNS_JSON_GZ} or {COLUMNS_TXT}",
            dir.display()
        )
    })?;
    let cols = load_columns(&path)?;
    Ok((path, cols))
}

/// 读取训练时的列顺序；原样返回，不做校验
///
/// `.txt` 按行读取（跳过空行），其余按 JSON 字符串数组解析（可带 `.gz`）。
pub fn load_columns(path: &Path) -> Result<Vec<String>> {
    let s = read_artifact_to_string(path)?;

    if path.extension().and_then(|e| e.to_str()) == Some("txt") {
        let out = s
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        tracing::debug!(path = %path.display(), n = out.len(), "loaded column order (txt)");
        return Ok(out);
    }

    let cols: Vec<String> = serde_json::from_str(&s)
        .with_context(|| format!("parse column order: {}", path.display()))?;
    tracing::debug!(path = %path.display(), n = cols.len(), "loaded column order (json)");
    Ok(cols)
}
