//! 参数读取：分类器给出的参数类型并不总是规整的（数字写成字符串、数组写成逗号串）

use serde_json::Value;

/// 非空字符串参数；数字按字符串返回
pub fn string(params: &Value, name: &str) -> Option<String> {
    match params.get(name)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 依次尝试多个名字（兼容 sessionId / session_id 这类别名）
pub fn string_any(params: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| string(params, n))
}

/// 字符串列表：数组或逗号分隔字符串
pub fn string_list(params: &Value, name: &str) -> Vec<String> {
    let items: Vec<String> = match params.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn usize_or(params: &Value, name: &str, default: usize) -> usize {
    match params.get(name) {
        Some(Value::Number(n)) => n.as_f64().map(|f| f.max(0.0) as usize).unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f.max(0.0) as usize).unwrap_or(default),
        _ => default,
    }
}

pub fn bool_or(params: &Value, name: &str, default: bool) -> bool {
    match params.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}
