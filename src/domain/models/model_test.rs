use anyhow::Result;

use super::format_bytes;
use super::Model;
use super::ModelDetails;
use super::ModelListResponse;

#[test]
fn it_formats_zero_bytes() {
    insta::assert_snapshot!(format_bytes(0, 2), @"0 Bytes");
}

#[test]
fn it_formats_bytes() {
    insta::assert_snapshot!(format_bytes(512, 2), @"512 Bytes");
    insta::assert_snapshot!(format_bytes(1536, 2), @"1.5 KB");
    insta::assert_snapshot!(format_bytes(1024 * 1024, 2), @"1 MB");
    insta::assert_snapshot!(format_bytes(3_826_793_677, 2), @"3.56 GB");
}

#[test]
fn it_formats_bytes_with_fewer_decimals() {
    insta::assert_snapshot!(format_bytes(3_826_793_677, 0), @"4 GB");
}

#[test]
fn it_summarizes_models() {
    let model = Model {
        name: "llama2:latest".to_string(),
        size: 3_826_793_677,
        details: ModelDetails {
            parameter_size: "7B".to_string(),
            quantization_level: "Q4_0".to_string(),
            ..ModelDetails::default()
        },
        ..Model::default()
    };

    insta::assert_snapshot!(model.summary(), @"llama2:latest (3.56 GB), 7B, Q4_0");
}

#[test]
fn it_parses_tags_responses() -> Result<()> {
    let body = r#"{
        "models": [{
            "name": "llava:latest",
            "model": "llava:latest",
            "modified_at": "2023-12-07T09:32:18.757212583-08:00",
            "size": 4733363377,
            "digest": "e4c3eb471fd8",
            "details": {
                "format": "gguf",
                "family": "llama",
                "families": ["llama", "clip"],
                "parameter_size": "7B",
                "quantization_level": "Q4_0"
            }
        }]
    }"#;

    let res: ModelListResponse = serde_json::from_str(body)?;
    assert_eq!(res.models.len(), 1);
    assert_eq!(res.models[0].name, "llava:latest");
    assert_eq!(res.models[0].details.parent_model, "");
    assert_eq!(
        res.models[0].details.families,
        Some(vec!["llama".to_string(), "clip".to_string()])
    );

    return Ok(());
}
