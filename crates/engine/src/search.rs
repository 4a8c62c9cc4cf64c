//! Linear search of a bucket list by extracted key.
//!
//! This is the single comparison point of the engine: uniqueness on
//! insert, hit detection on get and remove all come through here. Each
//! non-null slot is untransformed, its key extracted, and compared with
//! `Value` equality - so cross-type keys never match.

use largeset_core::error::Result;
use largeset_core::functions::FunctionContext;
use largeset_core::value::Value;

/// Position of the first member whose extracted key equals `key`.
pub fn find_position(
    list: &[Value],
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<usize>> {
    for (i, slot) in list.iter().enumerate() {
        if slot.is_null() {
            continue;
        }
        let live = fctx.read_form(slot)?;
        if fctx.extract_key(&live)? == *key {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use largeset_core::descriptor::LsetMap;
    use largeset_core::functions::{UserModule, UserModuleRegistry};

    #[test]
    fn finds_by_value_equality() {
        let fctx = FunctionContext::default();
        let list = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(find_position(&list, &Value::Int(2), &fctx).unwrap(), Some(1));
        assert_eq!(find_position(&list, &Value::Int(9), &fctx).unwrap(), None);
    }

    #[test]
    fn cross_type_keys_never_match() {
        let fctx = FunctionContext::default();
        let list = vec![Value::Int(1)];
        assert_eq!(
            find_position(&list, &Value::Float(1.0), &fctx).unwrap(),
            None
        );
        assert_eq!(
            find_position(&list, &Value::String("1".into()), &fctx).unwrap(),
            None
        );
    }

    #[test]
    fn null_slots_are_skipped() {
        let fctx = FunctionContext::default();
        let list = vec![Value::Null, Value::Int(5)];
        assert_eq!(find_position(&list, &Value::Int(5), &fctx).unwrap(), Some(1));
    }

    #[test]
    fn search_untransforms_before_comparing() {
        let mut registry = UserModuleRegistry::new();
        registry.register(
            "m",
            UserModule::new()
                .with_transform("unwrap", |v| match v {
                    Value::Array(mut a) if a.len() == 1 => Ok(a.remove(0)),
                    other => Ok(other),
                }),
        );
        let map = LsetMap {
            user_module: Some("m".into()),
            untransform: Some("unwrap".into()),
            ..LsetMap::default()
        };
        let fctx = FunctionContext::resolve(&registry, &map, None).unwrap();

        // Stored form wraps each member in a one-element array.
        let list = vec![Value::Array(vec![Value::Int(7)])];
        assert_eq!(find_position(&list, &Value::Int(7), &fctx).unwrap(), Some(0));
    }
}
