use std::sync::{Arc, Mutex};

use collection_literals::btree;
use trellis_config::{ClassRegistry, Declarations, SlotDecl, ValueType};
use trellis_core::Value;
use trellis_reactive::{
    Class, HookTable, Instance, InstanceFactory, Owned, ReactiveConfig, ReactiveError,
};

/// Hooks record what they saw in the instance state.
type Log = Vec<String>;

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "unset".to_string(),
        Some(Value::Integer(i)) => i.to_string(),
        Some(other) => format!("{:?}", other),
    }
}

fn map_class(hooks: HookTable<Log>) -> Class<Log> {
    let mut classes = ClassRegistry::new();
    let descriptor = classes
        .register(
            "Map",
            &[],
            Declarations::new()
                .declare("zoom_", SlotDecl::new(8).typed(ValueType::Integer))
                .slot("title", "untitled"),
        )
        .unwrap();
    Class::new(descriptor, hooks).unwrap()
}

fn logging_hooks() -> HookTable<Log> {
    HookTable::new()
        .before("zoom", |map: &mut Instance<Log>, value, old| {
            map.state_mut()
                .push(format!("before {} {}", describe(Some(&value)), describe(old)));
            Ok(value)
        })
        .after("zoom", |map: &mut Instance<Log>, value, old| {
            map.state_mut()
                .push(format!("after {} {}", describe(Some(value)), describe(old)));
            Ok(())
        })
}

#[test]
fn test_default_zoom_then_first_change() {
    let class = map_class(logging_hooks());
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    assert_eq!(map.get("zoom").unwrap(), Value::from(8));
    assert!(map.state().is_empty());
    assert!(!map.is_set("zoom"));

    assert!(map.set("zoom", 10).unwrap());
    assert_eq!(map.state(), &["before 10 8", "after 10 8"]);
    assert!(map.is_set("zoom"));
}

#[test]
fn test_equal_value_skips_after_hook() {
    let class = map_class(logging_hooks());
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    assert!(!map.set("zoom", 8).unwrap());
    assert_eq!(map.state(), &["before 8 8"]);
}

#[test]
fn test_before_hook_returning_old_value_keeps_slot() {
    let hooks = HookTable::new()
        .before("zoom", |_: &mut Instance<Log>, value: Value, old: Option<&Value>| {
            match value.as_i64() {
                Some(z) if z > 20 => Ok(old.cloned().unwrap_or(value)),
                _ => Ok(value),
            }
        })
        .after("zoom", |map: &mut Instance<Log>, _, _| {
            map.state_mut().push("after".to_string());
            Ok(())
        });
    let class = map_class(hooks);
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    assert!(!map.set("zoom", 99).unwrap());
    assert_eq!(map.get("zoom").unwrap(), Value::from(8));
    assert!(map.state().is_empty());
}

#[test]
fn test_before_hook_error_aborts_assignment() {
    let hooks = HookTable::new()
        .before("zoom", |_: &mut Instance<Log>, value: Value, _| {
            if value.as_i64() == Some(0) {
                return Err(ReactiveError::rejected("zoom", "zoom must be positive"));
            }
            Ok(value)
        })
        .after("zoom", |map: &mut Instance<Log>, _, _| {
            map.state_mut().push("after".to_string());
            Ok(())
        });
    let class = map_class(hooks);
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();
    map.set("zoom", 12).unwrap();

    let err = map.set("zoom", 0).unwrap_err();
    assert!(err.is_hook_rejection());
    assert_eq!(map.get("zoom").unwrap(), Value::from(12));
    assert_eq!(map.state(), &["after"]);
}

#[test]
fn test_before_hook_output_is_type_checked() {
    let hooks = HookTable::new().before("zoom", |_: &mut Instance<Log>, _, _| Ok(Value::from("far")));
    let class = map_class(hooks);
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    let err = map.set("zoom", 3).unwrap_err();
    assert!(matches!(err, ReactiveError::InvalidType { .. }));
    assert_eq!(map.get("zoom").unwrap(), Value::from(8));
}

#[test]
fn test_plain_slots_store_without_hooks() {
    let class = map_class(logging_hooks());
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    assert!(map.set("title", "Sydney").unwrap());
    assert_eq!(map.get("title").unwrap(), Value::from("Sydney"));
    assert!(map.state().is_empty());

    let err = map.set("bearing", 90).unwrap_err();
    assert!(matches!(err, ReactiveError::UnknownSlot { .. }));
}

#[test]
fn test_construction_runs_ancestor_hooks_first() {
    let mut classes = ClassRegistry::new();
    classes
        .register("Component", &[], Declarations::new().slot("width_", 0))
        .unwrap();
    let descriptor = classes
        .register("Map", &["Component"], Declarations::new().slot("tiles_", 0))
        .unwrap();

    let component = Class::new(
        classes.get("Component").unwrap(),
        HookTable::new().after("width", |c: &mut Instance<Log>, value, old| {
            c.state_mut()
                .push(format!("width {} {}", describe(Some(value)), describe(old)));
            Ok(())
        }),
    )
    .unwrap();
    let map = component
        .extend(
            descriptor,
            HookTable::new().after("tiles", |m: &mut Instance<Log>, _, _| {
                // Sees the final sibling value and the ancestor's hook already ran.
                let width = m.get("width")?;
                let ran = m.state().iter().any(|line| line.starts_with("width"));
                m.state_mut().push(format!("tiles sees width {} ran {}", describe(Some(&width)), ran));
                Ok(())
            }),
        )
        .unwrap();

    // Config order does not matter; declaration order does.
    let config = Value::Map(btree! {
        "tiles".into() => Value::from(4),
        "width".into() => Value::from(640),
    });
    let instance = InstanceFactory::default()
        .create(&map, config, Log::new())
        .unwrap();

    assert_eq!(
        instance.state(),
        &["width 640 unset", "tiles sees width 640 ran true"]
    );
}

#[test]
fn test_batch_stores_everything_before_after_hooks() {
    let mut classes = ClassRegistry::new();
    let descriptor = classes
        .register(
            "Map",
            &[],
            Declarations::new().slot("center_", Value::Null).slot("zoom_", 8),
        )
        .unwrap();
    let class = Class::new(
        descriptor,
        HookTable::new().after("center", |m: &mut Instance<Log>, _, _| {
            let zoom = m.get("zoom")?;
            m.state_mut().push(format!("center sees zoom {}", describe(Some(&zoom))));
            Ok(())
        }),
    )
    .unwrap();
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    map.set_many([
        ("zoom", Value::from(12)),
        ("center", Value::from("Sydney")),
    ])
    .unwrap();
    assert_eq!(map.state(), &["center sees zoom 12"]);
}

#[test]
fn test_construction_before_hook_sees_later_sibling() {
    let mut classes = ClassRegistry::new();
    let descriptor = classes
        .register(
            "Map",
            &[],
            Declarations::new().slot("layers_", 0).slot("style", 0),
        )
        .unwrap();
    let class = Class::new(
        descriptor,
        HookTable::new().before("layers", |m: &mut Instance<Log>, value: Value, _| {
            let style = m.get("style")?;
            m.state_mut().push(format!("layers sees style {}", describe(Some(&style))));
            Ok(value)
        }),
    )
    .unwrap();

    let config = Value::Map(btree! {
        "layers".into() => Value::from(1),
        "style".into() => Value::from(5),
    });
    let mut map = InstanceFactory::default()
        .create(&class, config, Log::new())
        .unwrap();

    assert_eq!(map.state(), &["layers sees style 5"]);
    assert_eq!(map.get("layers").unwrap(), Value::from(1));
}

#[test]
fn test_rejected_batch_restores_unsettled_slots() {
    let mut classes = ClassRegistry::new();
    let descriptor = classes
        .register(
            "Map",
            &[],
            Declarations::new()
                .slot("title", "untitled")
                .slot("zoom_", 8)
                .slot("style", "plain"),
        )
        .unwrap();
    let class = Class::new(
        descriptor,
        HookTable::new().before("zoom", |_: &mut Instance<Log>, value: Value, _| {
            if value.as_i64() == Some(0) {
                return Err(ReactiveError::rejected("zoom", "zoom must be positive"));
            }
            Ok(value)
        }),
    )
    .unwrap();
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    let err = map
        .set_many([
            ("title", Value::from("Sydney")),
            ("zoom", Value::from(0)),
            ("style", Value::from("dark")),
        ])
        .unwrap_err();
    assert!(err.is_hook_rejection());
    assert_eq!(map.get("title").unwrap(), Value::from("Sydney"));
    assert_eq!(map.get("zoom").unwrap(), Value::from(8));
    assert_eq!(map.get("style").unwrap(), Value::from("plain"));
    assert!(!map.is_set("style"));
}

#[test]
fn test_reentrant_set_reruns_hooks() {
    let hooks = HookTable::new()
        .before("zoom", |map: &mut Instance<Log>, value: Value, _| {
            map.state_mut().push(format!("before {}", describe(Some(&value))));
            Ok(value)
        })
        .after("zoom", |map: &mut Instance<Log>, value, old| {
            map.state_mut()
                .push(format!("after {} {}", describe(Some(value)), describe(old)));
            if value.as_i64().is_some_and(|z| z > 18) {
                map.set("zoom", 18)?;
            }
            Ok(())
        });
    let class = map_class(hooks);
    let mut map = InstanceFactory::default()
        .create(&class, Value::Null, Log::new())
        .unwrap();

    map.set("zoom", 25).unwrap();
    assert_eq!(map.get("zoom").unwrap(), Value::from(18));
    assert_eq!(
        map.state(),
        &["before 25", "after 25 8", "before 18", "after 18 25"]
    );
}

#[test]
fn test_runaway_reentrancy_hits_depth_limit() {
    let hooks = HookTable::new().after("zoom", |map: &mut Instance<Log>, value: &Value, _| {
        let next = value.as_i64().unwrap_or(0) + 1;
        map.set("zoom", next)?;
        Ok(())
    });
    let class = map_class(hooks);
    let factory = InstanceFactory::new(ReactiveConfig {
        max_hook_depth: 5,
        ..Default::default()
    });
    let mut map = factory.create(&class, Value::Null, Log::new()).unwrap();

    let err = map.set("zoom", 1).unwrap_err();
    assert!(matches!(err, ReactiveError::DepthExceeded { limit: 5, .. }));
    assert_eq!(map.get("zoom").unwrap(), Value::from(5));
}

#[test]
fn test_instance_hook_override_is_local() {
    let class = map_class(logging_hooks());
    let factory = InstanceFactory::default();
    let mut plain = factory.create(&class, Value::Null, Log::new()).unwrap();
    let mut custom = factory.create(&class, Value::Null, Log::new()).unwrap();

    let replaced = std::mem::take(custom.hooks_mut());
    *custom.hooks_mut() = replaced.after("zoom", |map: &mut Instance<Log>, _, _| {
        map.state_mut().push("custom".to_string());
        Ok(())
    });

    custom.set("zoom", 3).unwrap();
    plain.set("zoom", 3).unwrap();
    assert_eq!(custom.state(), &["before 3 8", "custom"]);
    assert_eq!(plain.state(), &["before 3 8", "after 3 8"]);
}

#[test]
fn test_destroy_tears_down_in_order() {
    let mut classes = ClassRegistry::new();
    let store_descriptor = classes
        .register("Store", &[], Declarations::new().slot("items_", Value::array()))
        .unwrap();
    let owner_descriptor = classes
        .register("Owner", &[], Declarations::new().slot("title_", ""))
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::<String>::new()));
    let store_events = Arc::clone(&events);
    let store_class = Class::new(
        store_descriptor,
        HookTable::new().on_destroy(move |_: &mut Instance<()>| {
            store_events.lock().unwrap().push("store destroyed".to_string());
            Ok(())
        }),
    )
    .unwrap();
    let owner_events = Arc::clone(&events);
    let owner_class = Class::new(
        owner_descriptor,
        HookTable::new().on_destroy(move |owner: &mut Instance<()>| {
            let alive = owner.owned::<Instance<()>>("store").is_some();
            owner_events
                .lock()
                .unwrap()
                .push(format!("owner hook, store alive {}", alive));
            Ok(())
        }),
    )
    .unwrap();

    let factory = InstanceFactory::default();
    let store = factory.create(&store_class, Value::Null, ()).unwrap();
    let store_bus = store.bus().clone();
    let mut owner = factory.create(&owner_class, Value::Null, ()).unwrap();
    owner.adopt("store", Box::new(store));
    owner.listen(&store_bus, "load", |_: &[Value]| Ok(()));
    owner.bus().on("change", |_: &[Value]| Ok(()));
    assert_eq!(store_bus.listener_count("load"), 1);

    owner.destroy();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["owner hook, store alive true", "store destroyed"]
    );
    assert_eq!(store_bus.listener_count("load"), 0);
    assert!(!owner.bus().has_listeners("change"));
    assert!(owner.is_destroyed());
    assert!(matches!(
        owner.set("title", "x").unwrap_err(),
        ReactiveError::Destroyed { .. }
    ));

    // Second teardown is a no-op.
    owner.destroy();
    assert_eq!(events.lock().unwrap().len(), 2);
}

#[test]
fn test_adopting_replaces_and_destroys_previous_child() {
    let mut classes = ClassRegistry::new();
    let descriptor = classes
        .register("Store", &[], Declarations::new().slot("items_", Value::array()))
        .unwrap();
    let store_class = Class::new(descriptor.clone(), HookTable::<()>::new()).unwrap();
    let factory = InstanceFactory::default();

    let mut owner = factory.create(&store_class, Value::Null, ()).unwrap();
    owner.adopt("child", Box::new(factory.create(&store_class, Value::Null, ()).unwrap()));
    let first_bus = owner.owned::<Instance<()>>("child").unwrap().bus().clone();
    first_bus.on("load", |_: &[Value]| Ok(()));

    owner.adopt("child", Box::new(factory.create(&store_class, Value::Null, ()).unwrap()));
    assert!(!first_bus.has_listeners("load"));

    let released = owner.release("child").unwrap();
    assert!(!released.as_any().downcast_ref::<Instance<()>>().unwrap().is_destroyed());
    assert!(!owner.destroy_child("child"));
}
