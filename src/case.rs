//! Identifier case helpers: entity/type names are Capitalized, bean fields map to snake_case columns.

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Upper-case the first character: "user" -> "User".
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Find a row/map entry for a bean field: exact name first, then its snake_case column form.
pub fn lookup_field<'a>(
    map: &'a serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Option<&'a serde_json::Value> {
    map.get(field).or_else(|| map.get(&to_snake_case(field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_to_snake_case() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("name"), "name");
    }

    #[test]
    fn capitalizes_first_letter_only() {
        assert_eq!(capitalize("user"), "User");
        assert_eq!(capitalize("orderLine"), "OrderLine");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn field_lookup_falls_back_to_snake_case() {
        let row = json!({"user_name": "bob", "id": 3});
        let map = row.as_object().unwrap();
        assert_eq!(lookup_field(map, "userName"), Some(&json!("bob")));
        assert_eq!(lookup_field(map, "id"), Some(&json!(3)));
        assert_eq!(lookup_field(map, "missing"), None);
    }
}
