//! SQL type inference from Rust types.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

/// Infer the SQL type from a Rust type, returning a TokenStream that
/// constructs the matching `SqlType` variant.
pub fn infer_sql_type(ty: &Type) -> TokenStream {
    let type_str = type_to_string(unwrap_option_type(ty));

    match type_str.as_str() {
        "bool" => quote! { sqlbulk_core::SqlType::Boolean },

        "i8" => quote! { sqlbulk_core::SqlType::TinyInt },
        "i16" | "u8" => quote! { sqlbulk_core::SqlType::SmallInt },
        "i32" | "u16" => quote! { sqlbulk_core::SqlType::Integer },
        "i64" | "u32" => quote! { sqlbulk_core::SqlType::BigInt },

        "f32" => quote! { sqlbulk_core::SqlType::Real },
        "f64" => quote! { sqlbulk_core::SqlType::Double },

        "String" | "&str" | "str" => quote! { sqlbulk_core::SqlType::Text },

        "Vec<u8>" | "&[u8]" | "[u8]" => quote! { sqlbulk_core::SqlType::Blob },

        "serde_json::Value" => quote! { sqlbulk_core::SqlType::Json },

        // Most permissive fallback
        _ => quote! { sqlbulk_core::SqlType::Text },
    }
}

/// Parse an explicit `sql_type` attribute string into a `SqlType` TokenStream.
///
/// Returns `None` for names that have no `SqlType` counterpart.
pub fn parse_sql_type_attr(sql_type: &str) -> Option<TokenStream> {
    let upper = sql_type.to_uppercase();
    let trimmed = upper.trim();

    if let Some(rest) = trimmed.strip_prefix("VARCHAR(") {
        let len = rest.strip_suffix(')')?.trim().parse::<u32>().ok()?;
        return Some(quote! { sqlbulk_core::SqlType::VarChar(#len) });
    }

    for prefix in ["NUMERIC(", "DECIMAL("] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let (p_str, s_str) = rest.strip_suffix(')')?.split_once(',')?;
            let p = p_str.trim().parse::<u8>().ok()?;
            let s = s_str.trim().parse::<u8>().ok()?;
            return Some(quote! { sqlbulk_core::SqlType::Numeric { precision: #p, scale: #s } });
        }
    }

    let ts = match trimmed {
        "TINYINT" => quote! { sqlbulk_core::SqlType::TinyInt },
        "SMALLINT" | "INT2" => quote! { sqlbulk_core::SqlType::SmallInt },
        "INTEGER" | "INT" | "INT4" => quote! { sqlbulk_core::SqlType::Integer },
        "BIGINT" | "INT8" => quote! { sqlbulk_core::SqlType::BigInt },
        "REAL" | "FLOAT4" => quote! { sqlbulk_core::SqlType::Real },
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" | "FLOAT" => {
            quote! { sqlbulk_core::SqlType::Double }
        }
        "NUMERIC" | "DECIMAL" => {
            quote! { sqlbulk_core::SqlType::Numeric { precision: 38, scale: 18 } }
        }
        "BOOLEAN" | "BOOL" => quote! { sqlbulk_core::SqlType::Boolean },
        "TEXT" => quote! { sqlbulk_core::SqlType::Text },
        "VARCHAR" => quote! { sqlbulk_core::SqlType::VarChar(255) },
        "BLOB" => quote! { sqlbulk_core::SqlType::Blob },
        "DATE" => quote! { sqlbulk_core::SqlType::Date },
        "DATETIME" => quote! { sqlbulk_core::SqlType::DateTime },
        "TIMESTAMP" => quote! { sqlbulk_core::SqlType::Timestamp },
        "JSON" => quote! { sqlbulk_core::SqlType::Json },
        _ => return None,
    };
    Some(ts)
}

/// Unwrap `Option<T>` to get the inner type, or return the original type.
pub fn unwrap_option_type(ty: &Type) -> &Type {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return inner;
                    }
                }
            }
        }
    }
    ty
}

/// Convert a Type to a simplified string representation for matching.
fn type_to_string(ty: &Type) -> String {
    use quote::ToTokens;
    ty.to_token_stream().to_string().replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_infer_primitives() {
        let ty: Type = parse_quote!(i32);
        assert!(infer_sql_type(&ty).to_string().contains("Integer"));

        let ty: Type = parse_quote!(i64);
        assert!(infer_sql_type(&ty).to_string().contains("BigInt"));

        let ty: Type = parse_quote!(bool);
        assert!(infer_sql_type(&ty).to_string().contains("Boolean"));
    }

    #[test]
    fn test_infer_option() {
        let ty: Type = parse_quote!(Option<f64>);
        assert!(infer_sql_type(&ty).to_string().contains("Double"));
    }

    #[test]
    fn test_parse_sql_type_varchar() {
        let result = parse_sql_type_attr("varchar(100)").unwrap().to_string();
        assert!(result.contains("VarChar"));
        assert!(result.contains("100"));
    }

    #[test]
    fn test_parse_sql_type_numeric() {
        let result = parse_sql_type_attr("DECIMAL(10, 2)").unwrap().to_string();
        assert!(result.contains("Numeric"));
        assert!(result.contains("10"));
    }

    #[test]
    fn test_parse_sql_type_unknown() {
        assert!(parse_sql_type_attr("GEOMETRY").is_none());
        assert!(parse_sql_type_attr("VARCHAR(x)").is_none());
    }
}
