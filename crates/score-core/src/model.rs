use anyhow::{anyhow, ensure, Context, Result};
use std::path::{Path, PathBuf};

use crate::util::{logit, read_artifact_to_string, sigmoid};
use crate::xgb_json::{GradientBooster, TreeJson, XgbModelJson};

pub const MODEL_JSON: &str = "gbt_model.json";
pub const MODEL_JSON_GZ: &str = "gbt_model.json.gz";

/// 模型对外只暴露一个能力：给一行 dense 特征，返回一个数值预测
pub trait Predictor {
    fn predict(&self, row: &[f32]) -> Result<f32>;

    /// 模型声明的特征数（未知时 None）
    fn num_features(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnsupportedObjective(String),
    UnsupportedBooster(&'static str),
    MultiOutput { num_class: usize, num_target: usize },
    CategoricalSplit { tree: usize, node: usize },
    MalformedTree { tree: usize, reason: String },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::UnsupportedObjective(name) => write!(f, "unsupported objective: {name}"),
            ModelError::UnsupportedBooster(name) => write!(f, "unsupported booster: {name}"),
            ModelError::MultiOutput {
                num_class,
                num_target,
            } => write!(
                f,
                "multi-output model not supported (num_class={num_class}, num_target={num_target})"
            ),
            ModelError::CategoricalSplit { tree, node } => {
                write!(f, "categorical split not supported (tree={tree}, node={node})")
            }
            ModelError::MalformedTree { tree, reason } => {
                write!(f, "malformed tree {tree}: {reason}")
            }
        }
    }
}
impl std::error::Error for ModelError {}

/// margin -> 输出空间的变换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    Sigmoid,
}

impl Transform {
    /// 返回 (transform, base_score 是否是概率需要先转 margin)
    fn from_objective(name: &str) -> Result<(Self, bool), ModelError> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:absoluteerror" | "reg:pseudohubererror"
            | "reg:squaredlogerror" => Ok((Transform::Identity, false)),
            "binary:logistic" | "reg:logistic" => Ok((Transform::Sigmoid, true)),
            "binary:logitraw" => Ok((Transform::Identity, true)),
            other => Err(ModelError::UnsupportedObjective(other.to_string())),
        }
    }

    #[inline]
    fn apply(self, margin: f64) -> f64 {
        match self {
            Transform::Identity => margin,
            Transform::Sigmoid => sigmoid(margin),
        }
    }
}

/// 单棵树，SoA 布局；叶子的 `left == -1`，叶子值存在 `cond` 里
#[derive(Debug, Clone)]
pub struct Tree {
    left: Vec<i32>,
    right: Vec<i32>,
    feature: Vec<u32>,
    cond: Vec<f32>,
    default_left: Vec<bool>,
    weight: f32,
}

impl Tree {
    fn from_json(idx: usize, t: &TreeJson, weight: f32) -> Result<Self, ModelError> {
        let malformed = |reason: String| ModelError::MalformedTree { tree: idx, reason };

        let n = t.left_children.len();
        if n == 0 {
            return Err(malformed("empty tree".into()));
        }
        for (name, len) in [
            ("right_children", t.right_children.len()),
            ("split_indices", t.split_indices.len()),
            ("split_conditions", t.split_conditions.len()),
            ("default_left", t.default_left.len()),
        ] {
            if len != n {
                return Err(malformed(format!("{name} has {len} entries, expected {n}")));
            }
        }
        if let Some(node) = t.split_type.iter().position(|&s| s != 0) {
            return Err(ModelError::CategoricalSplit { tree: idx, node });
        }

        let mut feature = Vec::with_capacity(n);
        for i in 0..n {
            let (l, r) = (t.left_children[i], t.right_children[i]);
            if l == -1 {
                feature.push(0);
                continue;
            }
            if l < 0 || r < 0 || l as usize >= n || r as usize >= n {
                return Err(malformed(format!("node {i} has children out of range ({l}, {r})")));
            }
            let f = t.split_indices[i];
            if f < 0 {
                return Err(malformed(format!("node {i} has negative split index {f}")));
            }
            feature.push(f as u32);
        }

        Ok(Self {
            left: t.left_children.clone(),
            right: t.right_children.clone(),
            feature,
            cond: t.split_conditions.clone(),
            default_left: t.default_left.clone(),
            weight,
        })
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.left.len()
    }

    /// 从根走到叶子；NaN 走 default 方向。步数上限 = 节点数，防止环
    pub fn leaf_value(&self, row: &[f32]) -> Result<f32> {
        let mut node = 0usize;
        for _ in 0..=self.num_nodes() {
            let l = self.left[node];
            if l == -1 {
                return Ok(self.cond[node] * self.weight);
            }
            let fidx = self.feature[node] as usize;
            let x = *row
                .get(fidx)
                .ok_or_else(|| anyhow!("feature index {fidx} out of range for row of len {}", row.len()))?;
            let go_left = if x.is_nan() {
                self.default_left[node]
            } else {
                x < self.cond[node]
            };
            node = if go_left { l as usize } else { self.right[node] as usize };
        }
        Err(anyhow!("tree traversal did not terminate (cycle in node links)"))
    }
}

/// 纯 Rust 的 GBDT 推理（XGBoost JSON dump）
#[derive(Debug, Clone)]
pub struct GbtModel {
    pub objective: String,
    pub num_feature: usize,
    pub feature_names: Vec<String>,
    base_margin: f64,
    transform: Transform,
    trees: Vec<Tree>,
}

impl GbtModel {
    pub fn from_xgb_json(m: XgbModelJson) -> Result<Self, ModelError> {
        let learner = m.learner;
        let param = learner.learner_model_param;
        if param.num_class > 1 || param.num_target > 1 {
            return Err(ModelError::MultiOutput {
                num_class: param.num_class,
                num_target: param.num_target,
            });
        }

        let (transform, base_is_prob) = Transform::from_objective(&learner.objective.name)?;
        let base_margin = if base_is_prob {
            logit(param.base_score)
        } else {
            param.base_score
        };

        let (trees_json, weights) = match learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model.trees, Vec::new()),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (gbtree.model.trees, weight_drop),
            GradientBooster::Gblinear { .. } => {
                return Err(ModelError::UnsupportedBooster("gblinear"))
            }
        };
        if !weights.is_empty() && weights.len() != trees_json.len() {
            return Err(ModelError::MalformedTree {
                tree: 0,
                reason: format!(
                    "weight_drop has {} entries for {} trees",
                    weights.len(),
                    trees_json.len()
                ),
            });
        }

        let trees = trees_json
            .iter()
            .enumerate()
            .map(|(i, t)| Tree::from_json(i, t, weights.get(i).copied().unwrap_or(1.0)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            objective: learner.objective.name,
            num_feature: param.num_feature,
            feature_names: learner.feature_names,
            base_margin,
            transform,
            trees,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: XgbModelJson = serde_json::from_str(s).context("parse xgboost json model")?;
        Ok(Self::from_xgb_json(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = read_artifact_to_string(path)?;
        let model = Self::from_json_str(&s)
            .with_context(|| format!("load gbt model: {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            objective = %model.objective,
            trees = model.num_trees(),
            num_feature = model.num_feature,
            "gbt model loaded"
        );
        Ok(model)
    }

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// 未经变换的 margin
    pub fn predict_margin(&self, row: &[f32]) -> Result<f64> {
        // num_feature 为 0 表示模型没写，按树里用到的索引兜底
        ensure!(
            self.num_feature == 0 || row.len() == self.num_feature,
            "row has {} features, model expects exactly {}",
            row.len(),
            self.num_feature
        );
        let mut z = self.base_margin;
        for (i, t) in self.trees.iter().enumerate() {
            z += t.leaf_value(row).with_context(|| format!("tree {i}"))? as f64;
        }
        Ok(z)
    }
}

impl Predictor for GbtModel {
    fn predict(&self, row: &[f32]) -> Result<f32> {
        let z = self.predict_margin(row)?;
        Ok(self.transform.apply(z) as f32)
    }

    fn num_features(&self) -> Option<usize> {
        (self.num_feature > 0).then_some(self.num_feature)
    }
}

pub fn select_model_file(dir: &Path) -> Option<PathBuf> {
    [MODEL_JSON, MODEL_JSON_GZ]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

pub fn load_model_from_dir(dir: &Path) -> Result<(PathBuf, GbtModel)> {
    let path = select_model_file(dir).ok_or_else(|| {
        anyhow!(
            "missing model in model_dir={}, expected {MODEL_JSON} or {MODEL_JSON_GZ}",
            dir.display()
        )
    })?;
    let model = GbtModel::load(&path)?;
    Ok((path, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// f0 < 10 ? (f1 < 0.5 ? 1 : 2) : 3；f0 缺失走右，f1 缺失走左
    fn stump_model(objective: &str, base_score: &str) -> serde_json::Value {
        json!({
            "learner": {
                "learner_model_param": {"base_score": base_score, "num_feature": "2", "num_class": "0", "num_target": "1"},
                "objective": {"name": objective},
                "feature_names": ["f0", "f1"],
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "tree_info": [0, 0],
                        "trees": [
                            {
                                "left_children": [1, 3, -1, -1, -1],
                                "right_children": [2, 4, -1, -1, -1],
                                "split_indices": [0, 1, 0, 0, 0],
                                "split_conditions": [10.0, 0.5, 3.0, 1.0, 2.0],
                                "default_left": [0, 1, 0, 0, 0],
                                "split_type": [0, 0, 0, 0, 0]
                            },
                            {
                                "left_children": [-1],
                                "right_children": [-1],
                                "split_indices": [0],
                                "split_conditions": [0.25],
                                "default_left": [0]
                            }
                        ]
                    }
                }
            },
            "version": [2, 0, 3]
        })
    }

    fn load(v: serde_json::Value) -> Result<GbtModel> {
        GbtModel::from_json_str(&v.to_string())
    }

    #[test]
    fn regression_sums_leaves_and_base() {
        let m = load(stump_model("reg:squarederror", "5E-1")).unwrap();
        assert_eq!(m.num_trees(), 2);
        assert_eq!(m.num_features(), Some(2));
        assert_eq!(m.feature_names, vec!["f0", "f1"]);

        // 0.5 + 1.0 + 0.25
        assert!((m.predict(&[3.0, 0.0]).unwrap() - 1.75).abs() < 1e-6);
        // 0.5 + 2.0 + 0.25
        assert!((m.predict(&[3.0, 0.7]).unwrap() - 2.75).abs() < 1e-6);
        // split is strict `<`: f0 == 10 goes right
        assert!((m.predict(&[10.0, 0.0]).unwrap() - 3.75).abs() < 1e-6);
    }

    #[test]
    fn missing_values_follow_default_direction() {
        let m = load(stump_model("reg:squarederror", "0")).unwrap();
        assert!((m.predict(&[f32::NAN, 0.0]).unwrap() - 3.25).abs() < 1e-6);
        assert!((m.predict(&[1.0, f32::NAN]).unwrap() - 1.25).abs() < 1e-6);
    }

    #[test]
    fn logistic_converts_base_score_to_margin() {
        let m = load(stump_model("binary:logistic", "[5E-1]")).unwrap();
        let p = m.predict(&[3.0, 0.0]).unwrap() as f64;
        assert!((p - sigmoid(1.25)).abs() < 1e-6);
        assert!((m.predict_margin(&[3.0, 0.0]).unwrap() - 1.25).abs() < 1e-6);
    }

    #[test]
    fn dart_scales_by_weight_drop() {
        let mut v = stump_model("reg:squarederror", "0");
        let model = v["learner"]["gradient_booster"]["model"].take();
        v["learner"]["gradient_booster"] = json!({
            "name": "dart",
            "gbtree": {"name": "gbtree", "model": model},
            "weight_drop": [0.5, 2.0]
        });
        let m = load(v).unwrap();
        // 0.5 * 1.0 + 2.0 * 0.25
        assert!((m.predict(&[3.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn short_row_is_rejected() {
        let m = load(stump_model("reg:squarederror", "0")).unwrap();
        let err = m.predict(&[1.0]).unwrap_err();
        assert!(err.to_string().contains("model expects exactly 2"));
    }

    #[test]
    fn long_row_is_rejected() {
        let m = load(stump_model("reg:squarederror", "0")).unwrap();
        let err = m.predict(&[0.0; 6]).unwrap_err();
        assert_eq!(err.to_string(), "row has 6 features, model expects exactly 2");
    }

    #[test]
    fn unknown_num_feature_skips_shape_check() {
        let mut v = stump_model("reg:squarederror", "0");
        v["learner"]["learner_model_param"]["num_feature"] = json!("0");
        let m = load(v).unwrap();
        assert_eq!(m.num_features(), None);
        assert!((m.predict(&[3.0, 0.0, 9.0]).unwrap() - 1.25).abs() < 1e-6);
    }

    #[test]
    fn rejects_unsupported_models() {
        let err = load(stump_model("multi:softprob", "0")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::UnsupportedObjective("multi:softprob".into()))
        );

        let mut v = stump_model("reg:squarederror", "0");
        v["learner"]["gradient_booster"]["model"]["trees"][0]["split_type"] = json!([0, 1, 0, 0, 0]);
        let err = load(v).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::CategoricalSplit { tree: 0, node: 1 })
        );

        let mut v = stump_model("reg:squarederror", "0");
        v["learner"]["learner_model_param"]["num_target"] = json!("3");
        assert!(matches!(
            load(v).unwrap_err().downcast_ref::<ModelError>(),
            Some(ModelError::MultiOutput { num_target: 3, .. })
        ));

        let mut v = stump_model("reg:squarederror", "0");
        v["learner"]["gradient_booster"] = json!({"name": "gblinear", "model": {"weights": [0.0]}});
        assert_eq!(
            load(v).unwrap_err().downcast_ref::<ModelError>(),
            Some(&ModelError::UnsupportedBooster("gblinear"))
        );
    }

    #[test]
    fn rejects_out_of_range_children() {
        let mut v = stump_model("reg:squarederror", "0");
        v["learner"]["gradient_booster"]["model"]["trees"][0]["right_children"] = json!([9, 4, -1, -1, -1]);
        let err = load(v).unwrap_err();
        assert!(err.to_string().contains("malformed tree 0"), "{err}");
    }

    #[test]
    fn cyclic_tree_does_not_hang() {
        let mut v = stump_model("reg:squarederror", "0");
        v["learner"]["gradient_booster"]["model"]["trees"][1] = json!({
            "left_children": [1, 0],
            "right_children": [1, 0],
            "split_indices": [0, 0],
            "split_conditions": [1.0, 1.0],
            "default_left": [0, 0]
        });
        let m = load(v).unwrap();
        let err = m.predict(&[0.0, 0.0]).unwrap_err();
        assert!(format!("{err:#}").contains("did not terminate"));
    }
}
