//! 样例行构造：字面量特征 + dummy 点亮 + 缺失列补 0，最后按训练列顺序重排。

use serde_json::{Map, Value};

use crate::config::SampleSpec;

/// 宽表形式的单行（列名 -> 值），重排前的中间态
pub type Frame = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    MissingDummy { prefix: String },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::MissingDummy { prefix } => {
                write!(f, "No dummy column found for prefix '{prefix}'")
            }
        }
    }
}
impl std::error::Error for FrameError {}

/// 把 `columns` 中第一个以 `prefix` 开头的列在 frame 里置 1，返回该列名
pub fn activate_first_dummy<'a, I>(
    columns: I,
    prefix: &str,
    frame: &mut Frame,
) -> Result<String, FrameError>
where
    I: IntoIterator<Item = &'a String>,
{
    let col = columns
        .into_iter()
        .find(|c| c.starts_with(prefix))
        .ok_or_else(|| FrameError::MissingDummy {
            prefix: prefix.to_string(),
        })?;
    frame.insert(col.clone(), Value::from(1));
    Ok(col.clone())
}

/// 已按模型列顺序排好的 dense 行
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub columns: Vec<String>,
    pub values: Vec<f32>,
    /// (prefix, 被点亮的列)
    pub activated: Vec<(String, String)>,
}

impl SampleRow {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// 列名重复时返回第一个
    pub fn get(&self, name: &str) -> Option<f32> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i])
    }

    /// 按列顺序输出的 JSON object（诊断用；重复列名只保留最后一个值）
    pub fn to_json(&self) -> Value {
        let obj: Map<String, Value> = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(k, v)| (k.clone(), Value::from(*v as f64)))
            .collect();
        Value::Object(obj)
    }
}

fn frame_value(v: Option<&Value>) -> f32 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN) as f32,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        // 补 0 之后不应出现
        _ => f32::NAN,
    }
}

pub fn build_sample_row(columns: &[String], spec: &SampleSpec) -> Result<SampleRow, FrameError> {
    let mut frame = Frame::new();
    for (name, v) in &spec.values {
        frame.insert(name.clone(), Value::from(*v as f64));
    }

    let mut activated = Vec::with_capacity(spec.dummy_prefixes.len());
    for prefix in &spec.dummy_prefixes {
        let col = activate_first_dummy(columns, prefix, &mut frame)?;
        tracing::debug!(%prefix, column = %col, "activated dummy column");
        activated.push((prefix.clone(), col));
    }

    // 一次性补齐缺失列
    let missing: Vec<&String> = columns.iter().filter(|c| !frame.contains_key(*c)).collect();
    tracing::debug!(n_missing = missing.len(), "zero-filling missing columns");
    for c in missing {
        frame.insert(c.clone(), Value::from(0));
    }

    // 按训练列顺序重排；不在列表里的字面量特征在这里被丢弃
    let values = columns.iter().map(|c| frame_value(frame.get(c))).collect();

    Ok(SampleRow {
        columns: columns.to_vec(),
        values,
        activated,
    })
}
