//! Built-in demo script: a text input flowing into derived cells.

use std::sync::{Arc, Mutex};

use rill_core::{Cell, ExecutableUnit, Script, widgets};

/// Three cells: an input, a cell deriving output from it, and a footer.
pub fn script() -> Script {
    let name = Arc::new(Mutex::new(String::new()));
    let writer = name.clone();
    let reader = name.clone();

    let cells = vec![
        Cell::new(
            0,
            ExecutableUnit::new(move || {
                let value = widgets::text_input("name", "world")?;
                *writer.lock().unwrap() = value;
                Ok(())
            }),
        ),
        Cell::new(
            1,
            ExecutableUnit::new(move || {
                let name = reader.lock().unwrap().clone();
                widgets::text_keyed("greeting", format!("Hello, {name}!"))?;
                let shout = widgets::checkbox("shout", false)?;
                if shout {
                    let name = reader.lock().unwrap().to_uppercase();
                    widgets::text_keyed("loud", format!("HELLO, {name}!"))?;
                }
                Ok(())
            }),
        ),
        Cell::new(
            2,
            ExecutableUnit::new(|| {
                widgets::text("rendered by rill")?;
                Ok(())
            }),
        ),
    ];

    Script::from_cells("demo", cells)
}
