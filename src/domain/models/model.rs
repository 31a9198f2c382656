#[cfg(test)]
#[path = "model_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub families: Option<Vec<String>>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub parent_model: String,
    #[serde(default)]
    pub quantization_level: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub details: ModelDetails,
}

impl Model {
    pub fn summary(&self) -> String {
        let mut res = format!("{} ({})", self.name, format_bytes(self.size, 2));
        if !self.details.parameter_size.is_empty() {
            res = format!("{res}, {}", self.details.parameter_size);
        }
        if !self.details.quantization_level.is_empty() {
            res = format!("{res}, {}", self.details.quantization_level);
        }

        return res;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<Model>,
}

const SIZES: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Human readable size in powers of 1024 with trailing zeros dropped, e.g.
/// `1.5 KB`.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut idx = 0;
    let mut unit = 1_u128;
    while idx < SIZES.len() - 1 && u128::from(bytes) >= unit * 1024 {
        idx += 1;
        unit *= 1024;
    }
    let scaled = bytes as f64 / unit as f64;

    let mut res = format!("{scaled:.decimals$}");
    if res.contains('.') {
        res = res.trim_end_matches('0').trim_end_matches('.').to_string();
    }

    return format!("{res} {}", SIZES[idx]);
}
