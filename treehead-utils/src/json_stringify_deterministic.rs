use serde_json::Value;

#[derive(Clone, Default)]
pub struct Options {
    /// Indentation unit; `None` produces the compact form used for signing.
    pub space: Option<String>,
}

/// Stringifies `obj` with object keys sorted at every depth.
///
/// The compact form (no `space`) is the canonical encoding signed over by
/// tree heads, so two structurally equal values always produce the same bytes.
pub fn stringify_deterministic(obj: &Value, opts: Option<Options>) -> String {
    let opts = opts.unwrap_or_default();

    fn scalar(node: &Value) -> String {
        // scalars cannot fail to serialize
        serde_json::to_string(node).unwrap_or_default()
    }

    fn deterministic(node: &Value, level: usize, opts: &Options) -> String {
        let indent = opts
            .space
            .as_ref()
            .map(|s| "\n".to_string() + &s.repeat(level))
            .unwrap_or_default();
        let inner_indent = opts
            .space
            .as_ref()
            .map(|s| "\n".to_string() + &s.repeat(level + 1))
            .unwrap_or_default();
        let colon_separator = if opts.space.is_some() { ": " } else { ":" };

        match node {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => scalar(node),
            Value::Array(arr) => {
                if arr.is_empty() {
                    return "[]".to_string();
                }
                let out: Vec<String> = arr
                    .iter()
                    .map(|item| format!("{}{}", inner_indent, deterministic(item, level + 1, opts)))
                    .collect();
                format!("[{}{}]", out.join(","), indent)
            }
            Value::Object(obj) => {
                if obj.is_empty() {
                    return "{}".to_string();
                }
                let mut node_keys: Vec<&String> = obj.keys().collect();
                node_keys.sort();

                let out: Vec<String> = node_keys
                    .into_iter()
                    .map(|key| {
                        let value = deterministic(&obj[key.as_str()], level + 1, opts);
                        format!(
                            "{}{}{}{}",
                            inner_indent,
                            scalar(&Value::String(key.clone())),
                            colon_separator,
                            value
                        )
                    })
                    .collect();
                format!("{{{}{}}}", out.join(","), indent)
            }
        }
    }

    deterministic(obj, 0, &opts)
}
