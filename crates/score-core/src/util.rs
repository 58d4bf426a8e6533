use anyhow::{Context, Result};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// sigmoid 的反函数；p 会先夹到 (0, 1) 开区间内，避免 ±inf
#[inline]
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-16, 1.0 - 1e-16);
    (p / (1.0 - p)).ln()
}

#[inline]
pub fn is_gz(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("gz")
}

/// 打开一个 artifact；`.gz` 结尾的自动走 GzDecoder
pub fn open_artifact(path: &Path) -> Result<Box<dyn Read>> {
    let f = fs::File::open(path).with_context(|| format!("open artifact: {}", path.display()))?;
    if is_gz(path) {
        Ok(Box::new(flate2::read::GzDecoder::new(BufReader::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

pub fn read_artifact_to_string(path: &Path) -> Result<String> {
    let mut s = String::new();
    open_artifact(path)?
        .read_to_string(&mut s)
        .with_context(|| format!("read artifact: {}", path.display()))?;
    Ok(s)
}
