//! A minimal store of marker items owned by a map component.

use trellis_config::{ClassRegistry, Declarations, SlotDecl, ValueType};
use trellis_core::Value;
use trellis_reactive::{Class, HookTable, Instance};

use crate::error::Result;

/// Topic fired on a store's bus whenever its items change. The payload is
/// the new item array.
pub const LOAD: &str = "load";

pub type MarkerStore = Instance<()>;

/// Compile the `MarkerStore` class.
pub fn marker_store_class(classes: &mut ClassRegistry) -> Result<Class<()>> {
    let descriptor = classes.register(
        "MarkerStore",
        &[],
        Declarations::new().declare("items_", SlotDecl::new(Value::array()).typed(ValueType::Array)),
    )?;
    let hooks = HookTable::new().after("items", |store: &mut MarkerStore, items, _| {
        store.bus().fire(LOAD, std::slice::from_ref(items));
        Ok(())
    });
    Ok(Class::new(descriptor, hooks)?)
}
