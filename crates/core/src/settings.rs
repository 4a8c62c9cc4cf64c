//! Create-time configuration.
//!
//! The `create` operation (and the create-on-first-use path of `add`)
//! accepts an optional *create spec*:
//!
//! - a **string** naming a user module whose adjust-settings hook tunes
//!   the set map, or
//! - an **object** of recognized options, applied in a fixed order:
//!   `Package` preset first, then the named `UserModule`'s hook, then
//!   the explicit scalar options, so explicit options always win.
//!
//! Unknown object entries are ignored; recognized entries with the wrong
//! type raise `InputParam`. Binary store mode is declared but
//! unimplemented and is refused here rather than coerced.

use crate::descriptor::{KeyType, LsetMap, SetTypeStore, StoreMode};
use crate::error::{LdtError, Result};
use crate::functions::UserModuleRegistry;
use crate::value::Value;
use std::collections::HashMap;

/// Option key: packaged preset name.
pub const OPT_PACKAGE: &str = "Package";
/// Option key: bucket count.
pub const OPT_MODULO: &str = "Modulo";
/// Option key: compact-to-regular trigger.
pub const OPT_THRESHOLD: &str = "Threshold";
/// Option key: inline-to-sub-record promotion size.
pub const OPT_HASH_CELL_MAX_LIST: &str = "HashCellMaxList";
/// Option key: persistence layout (`"record"` / `"subrecord"`).
pub const OPT_SET_TYPE_STORE: &str = "SetTypeStore";
/// Option key: key discipline (`"atomic"` / `"complex"`).
pub const OPT_KEY_TYPE: &str = "KeyType";
/// Option key: bucket payload encoding (`"list"`; `"binary"` is refused).
pub const OPT_STORE_MODE: &str = "StoreMode";
/// Option key: key-extraction function name.
pub const OPT_KEY_FUNCTION: &str = "KeyFunction";
/// Option key: write-side transform name.
pub const OPT_TRANSFORM: &str = "Transform";
/// Option key: read-side untransform name.
pub const OPT_UNTRANSFORM: &str = "UnTransform";
/// Option key: user module name.
pub const OPT_USER_MODULE: &str = "UserModule";
/// Option key: advisory capacity ceiling.
pub const OPT_STORE_LIMIT: &str = "StoreLimit";

/// Apply a create spec to a freshly defaulted set map.
pub fn apply_create_spec(
    map: &mut LsetMap,
    spec: &Value,
    registry: &UserModuleRegistry,
) -> Result<()> {
    match spec {
        Value::String(module_name) => {
            apply_user_module(map, module_name, registry)?;
        }
        Value::Object(options) => {
            if let Some(v) = options.get(OPT_PACKAGE) {
                let name = expect_str(OPT_PACKAGE, v)?;
                apply_package(map, name)?;
            }
            if let Some(v) = options.get(OPT_USER_MODULE) {
                let name = expect_str(OPT_USER_MODULE, v)?;
                apply_user_module(map, name, registry)?;
            }
            apply_scalar_options(map, options)?;
        }
        other => {
            return Err(LdtError::InputParam {
                reason: format!(
                    "create spec must be a module name or an option map, got {}",
                    other.type_name()
                ),
            });
        }
    }

    if map.store_mode == StoreMode::Binary {
        return Err(LdtError::InputParam {
            reason: "binary store mode is not implemented".to_string(),
        });
    }
    Ok(())
}

fn apply_user_module(
    map: &mut LsetMap,
    module_name: &str,
    registry: &UserModuleRegistry,
) -> Result<()> {
    let module = registry.require(module_name)?;
    map.user_module = Some(module_name.to_string());
    if let Some(hook) = module.settings_hook() {
        hook(map);
    }
    Ok(())
}

fn apply_scalar_options(map: &mut LsetMap, options: &HashMap<String, Value>) -> Result<()> {
    if let Some(v) = options.get(OPT_MODULO) {
        map.modulo = expect_positive(OPT_MODULO, v)?;
    }
    if let Some(v) = options.get(OPT_THRESHOLD) {
        map.threshold = expect_positive(OPT_THRESHOLD, v)?;
    }
    if let Some(v) = options.get(OPT_HASH_CELL_MAX_LIST) {
        map.cell_max_list = expect_positive(OPT_HASH_CELL_MAX_LIST, v)?;
    }
    if let Some(v) = options.get(OPT_STORE_LIMIT) {
        let n = v.as_int().filter(|i| *i >= 0).ok_or_else(|| LdtError::InputParam {
            reason: format!("{} must be a non-negative integer", OPT_STORE_LIMIT),
        })?;
        map.store_limit = n as u64;
    }
    if let Some(v) = options.get(OPT_SET_TYPE_STORE) {
        map.set_type_store = match expect_str(OPT_SET_TYPE_STORE, v)? {
            "record" => SetTypeStore::Record,
            "subrecord" => SetTypeStore::SubRecord,
            other => {
                return Err(LdtError::InputParam {
                    reason: format!("unknown layout '{}'", other),
                })
            }
        };
    }
    if let Some(v) = options.get(OPT_KEY_TYPE) {
        map.key_type = match expect_str(OPT_KEY_TYPE, v)? {
            "atomic" => KeyType::Atomic,
            "complex" => KeyType::Complex,
            other => {
                return Err(LdtError::InputParam {
                    reason: format!("unknown key type '{}'", other),
                })
            }
        };
    }
    if let Some(v) = options.get(OPT_STORE_MODE) {
        map.store_mode = match expect_str(OPT_STORE_MODE, v)? {
            "list" => StoreMode::List,
            "binary" => StoreMode::Binary,
            other => {
                return Err(LdtError::InputParam {
                    reason: format!("unknown store mode '{}'", other),
                })
            }
        };
    }
    if let Some(v) = options.get(OPT_KEY_FUNCTION) {
        map.key_function = Some(expect_str(OPT_KEY_FUNCTION, v)?.to_string());
    }
    if let Some(v) = options.get(OPT_TRANSFORM) {
        map.transform = Some(expect_str(OPT_TRANSFORM, v)?.to_string());
    }
    if let Some(v) = options.get(OPT_UNTRANSFORM) {
        map.untransform = Some(expect_str(OPT_UNTRANSFORM, v)?.to_string());
    }
    Ok(())
}

/// Apply a packaged settings preset by name.
///
/// | package | effect |
/// |---------|--------|
/// | `StandardList` | sub-record layout, production defaults |
/// | `TestModeNumber` | atomic keys, small bucket table, early rehash |
/// | `TestModeObject` | complex keys, small bucket table, early rehash |
/// | `TestModeList` | sub-record layout, small bucket table, early rehash |
/// | `DebugModeList` | tiny sizes so every transition fires quickly |
pub fn apply_package(map: &mut LsetMap, name: &str) -> Result<()> {
    match name {
        "StandardList" => {
            map.set_type_store = SetTypeStore::SubRecord;
            map.store_mode = StoreMode::List;
        }
        "TestModeNumber" => {
            map.set_type_store = SetTypeStore::SubRecord;
            map.key_type = KeyType::Atomic;
            map.modulo = 31;
            map.threshold = 8;
        }
        "TestModeObject" => {
            map.set_type_store = SetTypeStore::SubRecord;
            map.key_type = KeyType::Complex;
            map.modulo = 31;
            map.threshold = 8;
        }
        "TestModeList" => {
            map.set_type_store = SetTypeStore::SubRecord;
            map.modulo = 31;
            map.threshold = 8;
            map.cell_max_list = 4;
        }
        "DebugModeList" => {
            map.set_type_store = SetTypeStore::SubRecord;
            map.modulo = 7;
            map.threshold = 4;
            map.cell_max_list = 2;
            map.ldr_entry_count_max = 10;
        }
        other => {
            return Err(LdtError::UserModuleBad {
                module: other.to_string(),
                reason: "unknown settings package".to_string(),
            });
        }
    }
    Ok(())
}

fn expect_str<'a>(key: &str, v: &'a Value) -> Result<&'a str> {
    v.as_str().ok_or_else(|| LdtError::InputParam {
        reason: format!("{} must be a string, got {}", key, v.type_name()),
    })
}

fn expect_positive(key: &str, v: &Value) -> Result<usize> {
    v.as_int()
        .filter(|i| *i > 0)
        .map(|i| i as usize)
        .ok_or_else(|| LdtError::InputParam {
            reason: format!("{} must be a positive integer", key),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::UserModule;

    fn options(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn scalar_options_apply() {
        let mut map = LsetMap::default();
        let spec = options(&[
            (OPT_MODULO, Value::Int(7)),
            (OPT_THRESHOLD, Value::Int(3)),
            (OPT_HASH_CELL_MAX_LIST, Value::Int(2)),
            (OPT_SET_TYPE_STORE, Value::String("record".into())),
            (OPT_STORE_LIMIT, Value::Int(500)),
        ]);
        apply_create_spec(&mut map, &spec, &UserModuleRegistry::new()).unwrap();
        assert_eq!(map.modulo, 7);
        assert_eq!(map.threshold, 3);
        assert_eq!(map.cell_max_list, 2);
        assert_eq!(map.set_type_store, SetTypeStore::Record);
        assert_eq!(map.store_limit, 500);
    }

    #[test]
    fn unknown_entries_are_ignored() {
        let mut map = LsetMap::default();
        let spec = options(&[("NoSuchOption", Value::Int(1))]);
        apply_create_spec(&mut map, &spec, &UserModuleRegistry::new()).unwrap();
        assert_eq!(map, LsetMap::default());
    }

    #[test]
    fn wrong_option_type_is_rejected() {
        let mut map = LsetMap::default();
        let spec = options(&[(OPT_MODULO, Value::String("lots".into()))]);
        let err = apply_create_spec(&mut map, &spec, &UserModuleRegistry::new()).unwrap_err();
        assert_eq!(err.error_code(), "InputParam");
    }

    #[test]
    fn binary_mode_is_refused() {
        let mut map = LsetMap::default();
        let spec = options(&[(OPT_STORE_MODE, Value::String("binary".into()))]);
        let err = apply_create_spec(&mut map, &spec, &UserModuleRegistry::new()).unwrap_err();
        assert_eq!(err.error_code(), "InputParam");
    }

    #[test]
    fn module_name_spec_runs_settings_hook() {
        let mut registry = UserModuleRegistry::new();
        registry.register(
            "tuning",
            UserModule::new().with_settings(|m| {
                m.threshold = 5;
                m.key_function = Some("key_id".into());
            }),
        );
        let mut map = LsetMap::default();
        apply_create_spec(&mut map, &Value::String("tuning".into()), &registry).unwrap();
        assert_eq!(map.threshold, 5);
        assert_eq!(map.user_module.as_deref(), Some("tuning"));
        assert_eq!(map.key_function.as_deref(), Some("key_id"));
    }

    #[test]
    fn missing_module_is_reported() {
        let mut map = LsetMap::default();
        let err = apply_create_spec(
            &mut map,
            &Value::String("ghost".into()),
            &UserModuleRegistry::new(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "UserModuleNotFound");
    }

    #[test]
    fn explicit_options_override_package() {
        let mut map = LsetMap::default();
        let spec = options(&[
            (OPT_PACKAGE, Value::String("DebugModeList".into())),
            (OPT_THRESHOLD, Value::Int(99)),
        ]);
        apply_create_spec(&mut map, &spec, &UserModuleRegistry::new()).unwrap();
        assert_eq!(map.modulo, 7); // from the package
        assert_eq!(map.threshold, 99); // explicit wins
    }

    #[test]
    fn unknown_package_is_rejected() {
        let mut map = LsetMap::default();
        let err = apply_package(&mut map, "NoSuchPackage").unwrap_err();
        assert_eq!(err.error_code(), "UserModuleBad");
    }

    #[test]
    fn bad_spec_type_is_rejected() {
        let mut map = LsetMap::default();
        let err =
            apply_create_spec(&mut map, &Value::Int(3), &UserModuleRegistry::new()).unwrap_err();
        assert_eq!(err.error_code(), "InputParam");
    }
}
