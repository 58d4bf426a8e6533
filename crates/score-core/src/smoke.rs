use anyhow::{ensure, Context, Result};
use std::path::PathBuf;

use crate::columns::{load_columns, load_columns_from_dir};
use crate::config::Config;
use crate::frame::{build_sample_row, SampleRow};
use crate::model::{load_model_from_dir, GbtModel, Predictor};

#[derive(Debug, Clone)]
pub struct SmokeReport {
    pub columns_path: PathBuf,
    pub model_path: PathBuf,
    pub num_trees: usize,
    pub row: SampleRow,
    pub prediction: f32,
}

impl SmokeReport {
    /// 和原脚本一致的两行输出
    pub fn summary_lines(&self) -> [String; 2] {
        [
            "Model loaded successfully.".to_string(),
            format!("Predicted score for the sample row: {:.2}", self.prediction),
        ]
    }
}

/// 载入列顺序和模型 -> 构造样例行 -> 预测
pub fn run(cfg: &Config) -> Result<SmokeReport> {
    let (columns_path, columns) = match &cfg.columns_path {
        Some(p) => (p.clone(), load_columns(p)?),
        None => load_columns_from_dir(&cfg.model_dir)?,
    };
    tracing::info!(path = %columns_path.display(), n = columns.len(), "column order loaded");

    let (model_path, model) = match &cfg.model_path {
        Some(p) => (p.clone(), GbtModel::load(p)?),
        None => load_model_from_dir(&cfg.model_dir)?,
    };

    if let Some(n) = model.num_features() {
        ensure!(
            columns.len() == n,
            "column order {} has {} columns, model {} expects {n}",
            columns_path.display(),
            columns.len(),
            model_path.display()
        );
    }

    if !model.feature_names.is_empty() && model.feature_names != columns {
        tracing::warn!(
            model_features = model.feature_names.len(),
            columns = columns.len(),
            "feature names embedded in the model differ from the column order artifact"
        );
    }

    let row = build_sample_row(&columns, &cfg.sample)?;
    let prediction = model
        .predict(row.as_slice())
        .with_context(|| format!("predict with model: {}", model_path.display()))?;
    tracing::info!(prediction, "sample row scored");

    Ok(SmokeReport {
        columns_path,
        model_path,
        num_trees: model.num_trees(),
        row,
        prediction,
    })
}
