use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 样例行的“配方”：固定的数值特征 + 需要点亮的 dummy 前缀
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleSpec {
    /// (列名, 数值)，按顺序写入 frame
    pub values: Vec<(String, f32)>,
    /// 每个前缀点亮第一个匹配的列
    pub dummy_prefixes: Vec<String>,
}

impl Default for SampleSpec {
    fn default() -> Self {
        let values = [
            ("capital_cny_w", 500.0),
            ("insured_number", 20.0),
            ("invention_patent_applications", 5.0),
            ("valid_invention_patents", 5.0),
            ("valid_utility_models", 8.0),
            ("valid_design_patents", 3.0),
            ("software_copyrights", 4.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let dummy_prefixes = ["city_district_", "type_", "industry_lv2_"]
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            values,
            dummy_prefixes,
        }
    }
}

/// smoke test 的运行配置；默认值即固定行为，文件里只需要写想覆盖的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// artifact 所在目录（相对当前工作目录）
    pub model_dir: PathBuf,

    /// 显式指定列顺序文件；None 时在 model_dir 中查找
    pub columns_path: Option<PathBuf>,

    /// 显式指定模型文件；None 时在 model_dir 中查找
    pub model_path: Option<PathBuf>,

    pub sample: SampleSpec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("model"),
            columns_path: None,
            model_path: None,
            sample: SampleSpec::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&s)
            .with_context(|| format!("parse config: {}", path.display()))?;
        Ok(cfg)
    }
}
