//! Case conversion for storage column names: record field names and ordering
//! expressions are turned into the snake_case form used by the store.

/// Convert a single identifier from PascalCase/camelCase to snake_case.
/// e.g. "ownerId" -> "owner_id", "CreatedAt" -> "created_at", "ID" -> "i_d"
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

#[cfg(test)]
mod tests {
    use super::to_snake_case;

    #[test]
    fn converts_pascal_and_camel_case() {
        assert_eq!(to_snake_case("CreatedAt"), "created_at");
        assert_eq!(to_snake_case("ownerId"), "owner_id");
        assert_eq!(to_snake_case("UserID"), "user_i_d");
    }

    #[test]
    fn leaves_snake_case_alone() {
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("owner_id"), "owner_id");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn every_uppercase_letter_gets_a_separator() {
        assert_eq!(to_snake_case("ID"), "i_d");
        assert_eq!(to_snake_case("X"), "x");
    }
}
