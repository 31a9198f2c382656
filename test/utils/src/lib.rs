use serde_json::json;

/// Builds a newline delimited `/api/generate` body the way Ollama streams it.
/// Every entry in `pieces` becomes a `done: false` line, followed by the final
/// `done: true` line carrying `context` when one is given.
pub fn generate_stream_fixture(model: &str, pieces: &[&str], context: Option<&[i64]>) -> String {
    let mut lines = pieces
        .iter()
        .map(|piece| {
            return json!({
                "model": model,
                "created_at": "2023-12-04T10:00:00.000000Z",
                "response": piece,
                "done": false,
            })
            .to_string();
        })
        .collect::<Vec<String>>();

    let mut done = json!({
        "model": model,
        "created_at": "2023-12-04T10:00:01.000000Z",
        "response": "",
        "done": true,
        "total_duration": 5_043_500_667_u64,
        "load_duration": 5_025_959_u64,
        "prompt_eval_count": 26,
        "prompt_eval_duration": 325_953_000_u64,
        "eval_count": 290,
        "eval_duration": 4_709_213_000_u64,
    });
    if let Some(ctx) = context {
        done["context"] = json!(ctx);
    }
    lines.push(done.to_string());

    return lines.join("\n") + "\n";
}

/// Conversations as written by earlier releases: a bare array of
/// `[id, conversation]` entries with no version envelope.
pub fn legacy_conversations_fixture() -> &'static str {
    return r#"[
  ["k3JdL0aZ", {
    "id": "k3JdL0aZ",
    "model": "llama2:latest",
    "ctx": [1, 2, 3],
    "chatHistory": [
      {"created_at": "2023-12-04T10:00:00.000Z", "who": "me", "txt": [{"type": "text", "content": "Why is the sky blue?"}]},
      {"created_at": "2023-12-04T10:00:05.000Z", "who": "ollama", "txt": [{"type": "text", "content": "Rayleigh scattering."}]}
    ],
    "name": "Sky",
    "createdAt": 1701684000000
  }],
  ["Qp9xT2mB", {
    "id": "Qp9xT2mB",
    "model": "mistral:latest",
    "ctx": [],
    "chatHistory": [],
    "createdAt": 1701684100000
  }]
]"#;
}

pub fn speech_fixture() -> &'static str {
    return "Oatmeal is a whole grain made from oats that have been rolled or ground. It is commonly eaten as porridge for breakfast, often topped with fruit, nuts, or honey. Supercalifragilisticexpialidociousnessandthensomemoretomakeitlongerthanonehundredcharactersfortestingpurposesonly ends here.";
}
