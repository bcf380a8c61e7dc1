//! Identifier casing for generated Go code.
//!
//! Schema names are snake_case. Exported Go identifiers use PascalCase and
//! local bindings use camelCase. The transforms are inverses of each other:
//! `to_snake(to_pascal(s)) == normalize(s)` for every identifier made of
//! lowercase letters, digits and underscores that starts with a letter.
//!
//! An underscore in front of a digit is preserved in the cased form (`a_1`
//! becomes `A_1`), otherwise `a_1` and `a1` would both map to `A1`.

/// Convert a snake_case name to PascalCase.
pub fn to_pascal(name: &str) -> String {
    transform(name, true)
}

/// Convert a snake_case name to camelCase.
pub fn to_camel(name: &str) -> String {
    transform(name, false)
}

/// Convert a PascalCase or camelCase identifier back to snake_case.
///
/// Every uppercase letter starts a new word; `_` is kept as-is.
pub fn to_snake(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, c) in ident.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip leading and trailing underscores and collapse runs of underscores.
pub fn normalize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn transform(name: &str, upper_first: bool) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name.split('_').filter(|p| !p.is_empty()).enumerate() {
        let mut chars = part.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        if first.is_ascii_digit() {
            if i > 0 {
                out.push('_');
            }
            out.push(first);
        } else if i == 0 && !upper_first {
            out.push(first.to_ascii_lowercase());
        } else {
            out.push(first.to_ascii_uppercase());
        }
        out.extend(chars.map(|c| c.to_ascii_lowercase()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_pascal() {
        assert_eq!(to_pascal("api_key"), "ApiKey");
        assert_eq!(to_pascal("api_key_id"), "ApiKeyId");
        assert_eq!(to_pascal("name"), "Name");
        assert_eq!(to_pascal("_leading__double_"), "LeadingDouble");
        assert_eq!(to_pascal("ipv4_address"), "Ipv4Address");
        assert_eq!(to_pascal("zone_1"), "Zone_1");
    }

    #[test]
    fn test_to_camel() {
        assert_eq!(to_camel("api_key"), "apiKey");
        assert_eq!(to_camel("id"), "id");
        assert_eq!(to_camel("a_b_c"), "aBC");
    }

    #[test]
    fn test_to_snake() {
        assert_eq!(to_snake("ApiKey"), "api_key");
        assert_eq!(to_snake("apiKeyId"), "api_key_id");
        assert_eq!(to_snake("ABC"), "a_b_c");
        assert_eq!(to_snake("Zone_1"), "zone_1");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("__a__b_"), "a_b");
        assert_eq!(normalize("plain"), "plain");
    }

    fn snake_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,24}"
    }

    proptest! {
        #[test]
        fn pascal_round_trips(s in snake_identifier()) {
            prop_assert_eq!(to_snake(&to_pascal(&s)), normalize(&s));
        }

        #[test]
        fn camel_round_trips(s in snake_identifier()) {
            prop_assert_eq!(to_snake(&to_camel(&s)), normalize(&s));
        }

        #[test]
        fn pascal_starts_uppercase(s in snake_identifier()) {
            let pascal = to_pascal(&s);
            prop_assert!(pascal.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
        }
    }
}
