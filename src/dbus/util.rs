/// Text representation used by `GetText` and the `Text` field of change
/// signals. Invalid (null) values render as `---` like on the GX device.
pub(crate) fn format_text_value(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "---".to_string(),
        serde_json::Value::Number(n) => {
            if n.is_f64() {
                n.as_f64().map_or_else(|| n.to_string(), |f| format!("{:.2}", f))
            } else {
                n.to_string()
            }
        }
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => val.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_values_like_venus() {
        assert_eq!(format_text_value(&serde_json::Value::Null), "---");
        assert_eq!(format_text_value(&serde_json::json!(2300)), "2300");
        assert_eq!(format_text_value(&serde_json::json!(49.98)), "49.98");
        assert_eq!(format_text_value(&serde_json::json!(5.0)), "5.00");
        assert_eq!(format_text_value(&serde_json::json!("TWC3 Handle")), "TWC3 Handle");
    }
}
