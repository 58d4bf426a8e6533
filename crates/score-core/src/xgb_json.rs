//! XGBoost JSON 模型（`Booster.save_model("*.json")`）里单行推理用得到的那部分 schema。
//!
//! XGBoost 把大部分标量参数写成字符串（`"num_feature": "12"`），2.1 起 `base_score`
//! 还会写成带方括号的向量（`"[5E-1]"`），所以标量字段都走宽松的反序列化。

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn scalar_f64(v: Value) -> Result<f64, String> {
    let mut cur = v;
    loop {
        match cur {
            Value::Number(n) => return n.as_f64().ok_or_else(|| "invalid number".to_string()),
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f64>() {
                    return Ok(f);
                }
                if let Some(inner) = t.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                    let first = inner.split(',').next().unwrap_or("").trim();
                    return first
                        .parse::<f64>()
                        .map_err(|_| format!("cannot parse number from string: {s}"));
                }
                return Err(format!("cannot parse number from string: {s}"));
            }
            Value::Array(arr) => {
                cur = arr
                    .into_iter()
                    .next()
                    .ok_or_else(|| "empty array".to_string())?;
            }
            _ => return Err("expected number, string, or array".to_string()),
        }
    }
}

fn de_f64_any<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_f64(Value::deserialize(deserializer)?).map_err(D::Error::custom)
}

fn de_usize_any<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let f = scalar_f64(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
    if f < 0.0 || f.fract() != 0.0 {
        return Err(D::Error::custom(format!("expected non-negative integer, got {f}")));
    }
    Ok(f as usize)
}

/// `default_left` 在 JSON 里是 0/1，UBJSON 转出来可能是 bool
fn de_bool_vec<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => match s.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                other => Err(D::Error::custom(format!("cannot parse bool from string: {other}"))),
            },
            _ => Err(D::Error::custom("unsupported type for bool")),
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbModelJson {
    pub learner: Learner,
    #[serde(default)]
    pub version: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    pub learner_model_param: LearnerModelParam,
    pub objective: Objective,
    pub gradient_booster: GradientBooster,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "de_f64_any")]
    pub base_score: f64,
    #[serde(default, deserialize_with = "de_usize_any")]
    pub num_feature: usize,
    #[serde(default, deserialize_with = "de_usize_any")]
    pub num_class: usize,
    #[serde(default = "default_num_target", deserialize_with = "de_usize_any")]
    pub num_target: usize,
}

fn default_num_target() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Objective {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Gblinear {
        #[allow(dead_code)]
        model: Value,
    },
    Dart {
        gbtree: GbtreeDef,
        #[serde(default)]
        weight_drop: Vec<f32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbtreeDef {
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<TreeJson>,
    #[serde(default)]
    pub tree_info: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeJson {
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    #[serde(deserialize_with = "de_bool_vec")]
    pub default_left: Vec<bool>,
    #[serde(default)]
    pub split_type: Vec<i32>,
}
